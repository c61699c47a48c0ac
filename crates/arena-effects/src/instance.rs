//! A live effect, owned by the manager and advanced once per tick.

use std::collections::HashMap;

use arena_core::world::ActorId;
use arena_core::{Tick, Vec2};

use crate::definition::{EndPolicy, FollowMode, Geometry, ReplicationSpec};

/// Identifies an [`EffectInstance`] for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EffectInstanceId(pub u64);

/// Delivery geometry's motion over time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotionState {
    /// Current world position.
    pub position: Vec2,
    /// Current velocity.
    pub velocity: Vec2,
    /// Remaining travel distance before the effect's range is exhausted.
    pub range_remaining: f32,
    /// Total distance travelled so far.
    pub travelled_length: f32,
}

impl Default for MotionState {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            range_remaining: 0.0,
            travelled_length: 0.0,
        }
    }
}

/// An instance's geometry, motion, and attachment state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeliveryState {
    /// Current geometry (may differ from the definition's if overridden).
    pub geometry: Geometry,
    /// Current motion state.
    pub motion: MotionState,
    /// Actor this instance's geometry is anchored to, if any.
    pub attached_actor_id: Option<ActorId>,
    /// How `attached_actor_id` is kept current.
    pub follow_mode: FollowMode,
}

/// An instance's gameplay bookkeeping: timers, cadence, accumulated effects.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BehaviorState {
    /// Ticks left before a `duration` end policy fires. Unused by
    /// `instant`/`condition` policies.
    pub ticks_remaining: u32,
    /// Ticks until the next on-tick hook invocation is allowed. Reserved for
    /// hooks that self-throttle independent of `tick_cadence`.
    pub cooldown_ticks: u32,
    /// `on-tick` only fires when `tick mod tick_cadence == 0`; `0` means
    /// every tick.
    pub tick_cadence: u32,
    /// Running damage total, maintained by hooks.
    pub accumulated_damage: f32,
    /// Designer-facing named counters (hits landed, pierces used, ...).
    pub counters: HashMap<String, i64>,
}

/// A live, manager-owned effect.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EffectInstance {
    /// Allocated identity.
    pub id: EffectInstanceId,
    /// The definition this instance was spawned from.
    pub type_id: String,
    /// Tick this instance was spawned on.
    pub start_tick: Tick,
    /// Delivery state.
    pub delivery: DeliveryState,
    /// Behavior state.
    pub behavior: BehaviorState,
    /// Numeric parameters (definition defaults merged with intent overrides).
    pub params: HashMap<String, f32>,
    /// Actor that spawned this instance.
    pub owner_actor_id: ActorId,
    /// Actor this instance follows, if `follow_mode != None`.
    pub follow_actor_id: Option<ActorId>,
    /// Replication gating, copied from the definition at spawn time.
    pub replication: ReplicationSpec,
    /// End policy, copied from the definition at spawn time.
    pub end_policy: EndPolicy,
}
