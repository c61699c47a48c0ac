//! A request to spawn an effect, queued for the effect manager.

use std::collections::HashMap;

use arena_core::world::ActorId;

use crate::definition::{DeliveryKind, Geometry};

/// A queued request to spawn an [`crate::instance::EffectInstance`].
#[derive(Debug, Clone, PartialEq)]
pub struct EffectIntent {
    /// Caller-assigned correlation id, echoed back in logs/telemetry only.
    pub entry_id: String,
    /// Which [`crate::definition::EffectDefinition`] to spawn from.
    pub type_id: String,
    /// Delivery kind (must agree with the definition; carried for
    /// validation convenience rather than re-derived).
    pub delivery_kind: DeliveryKind,
    /// Actor that caused this effect to spawn.
    pub source_actor_id: ActorId,
    /// Target actor, for target-delivery effects.
    pub target_actor_id: Option<ActorId>,
    /// Overrides the definition's default geometry.
    pub geometry_override: Option<Geometry>,
    /// Overrides the definition's default lifetime.
    pub duration_ticks_override: Option<u32>,
    /// Overrides the on-tick hook cadence.
    pub tick_cadence_override: Option<u32>,
    /// Per-spawn numeric parameters, merged over the definition's.
    pub params: HashMap<String, f32>,
}
