//! Effect lifecycle events emitted by the manager. Sequencing is the
//! journal's responsibility (see `arena-journal`); these carry only the tick
//! and the payload.

use std::collections::HashMap;

use arena_core::Tick;

use crate::instance::{BehaviorState, DeliveryState, EffectInstance, EffectInstanceId};

/// Why an instance's lifecycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EndReason {
    /// The end policy's natural condition was reached (duration elapsed,
    /// instant applied, or a condition fired and mapped to `expired`).
    Expired,
    /// The owner actor died or could no longer be found.
    OwnerLost,
    /// An explicit cancel signal was raised.
    Cancelled,
    /// The owner changed zones/maps.
    MapChange,
}

/// One lifecycle event, unsequenced; `arena-journal` assigns the per-instance
/// sequence number on intake.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The instance was created this tick.
    Spawn {
        /// Instance identity.
        instance_id: EffectInstanceId,
        /// Tick the instance spawned on.
        tick: Tick,
        /// A full copy of the instance as spawned.
        instance: EffectInstance,
    },
    /// The instance changed this tick.
    Update {
        /// Instance identity.
        instance_id: EffectInstanceId,
        /// Tick this update was produced on.
        tick: Tick,
        /// Updated delivery state, when the replication whitelist allows it.
        delivery: Option<DeliveryState>,
        /// Updated behavior state, when the replication whitelist allows it.
        behavior: Option<BehaviorState>,
        /// Updated parameters, when the replication whitelist allows it.
        params: Option<HashMap<String, f32>>,
    },
    /// The instance's lifecycle ended this tick.
    End {
        /// Instance identity.
        instance_id: EffectInstanceId,
        /// Tick the instance ended on.
        tick: Tick,
        /// Why it ended.
        reason: EndReason,
    },
}

impl LifecycleEvent {
    /// The instance id this event concerns.
    #[must_use]
    pub fn instance_id(&self) -> EffectInstanceId {
        match self {
            Self::Spawn { instance_id, .. }
            | Self::Update { instance_id, .. }
            | Self::End { instance_id, .. } => *instance_id,
        }
    }
}
