//! The actor/world data model: players, NPCs, the AI blackboard, obstacles,
//! ground items, and world configuration.

use std::collections::HashMap;

use crate::geom::{Facing, Vec2};
use crate::tick::Tick;

/// Identifies any actor (player or NPC) in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActorId(pub u64);

/// Identifies a ground item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroundItemId(pub u64);

/// A status effect applied to an actor (poison, stun, buff, ...). The
/// economy/combat-balance rules that produce these are out of scope; the
/// core only tracks expiry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusEffect {
    /// Designer-facing identifier, e.g. `"poison"`.
    pub kind: String,
    /// Tick this status expires on.
    pub expires_at: Tick,
    /// Stack count, for stackable statuses.
    pub stacks: u32,
}

/// Dynamic path state produced by the navigation grid and consumed by the
/// AI executor / movement step.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathState {
    /// Waypoints from the actor's position to the goal, in travel order.
    pub waypoints: Vec<Vec2>,
    /// Index of the next waypoint to travel toward.
    pub index: usize,
    /// The goal this path was planned toward, used to detect a changed
    /// destination during the recalc cooldown window.
    pub goal: Vec2,
    /// Tick before which re-planning to the same goal is suppressed.
    pub recalc_cooldown_until: Tick,
}

impl PathState {
    /// The waypoint currently being traveled toward, if any remain.
    #[must_use]
    pub fn current(&self) -> Option<Vec2> {
        self.waypoints.get(self.index).copied()
    }

    /// True once every waypoint has been consumed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.index >= self.waypoints.len()
    }
}

/// A player actor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Player {
    /// Stable actor identity.
    pub id: ActorId,
    /// World position.
    pub position: Vec2,
    /// Facing direction.
    pub facing: Facing,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Opaque reference into the (out of scope) inventory module.
    pub inventory_ref: Option<u64>,
    /// Opaque reference into the (out of scope) equipment module.
    pub equipment_ref: Option<u64>,
    /// Active status effects, keyed by kind.
    pub status_effects: HashMap<String, StatusEffect>,
    /// Wall-clock time (ms since epoch) of the last heartbeat received.
    pub last_heartbeat_ms: u64,
    /// Last observed round-trip time, in milliseconds.
    pub last_rtt_ms: u32,
    /// Dynamic pathfinding state, if a path has been requested.
    pub path: Option<PathState>,
    /// Per-ability tick at which the ability is next usable.
    pub ability_cooldowns: HashMap<String, u64>,
}

impl Player {
    /// True once health has reached zero.
    #[must_use]
    pub fn is_defeated(&self) -> bool {
        self.health <= 0.0
    }
}

/// Per-NPC mutable scratchpad consulted and updated only by the AI executor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Blackboard {
    /// Tick at which this NPC is next eligible for a decision.
    pub next_decision_tick: Tick,
    /// Tick the current state was entered on.
    pub state_entered_tick: Tick,
    /// Tick of the last decision made.
    pub last_decision_tick: Tick,
    /// Tick before which `timer-expired` cannot hold; `0` means unset.
    pub wait_until_tick: u64,
    /// Index into the NPC's authored waypoint list.
    pub waypoint_index: usize,
    /// Previous waypoint index, for stall detection.
    pub last_waypoint_index: usize,
    /// Best (smallest) distance observed to the current waypoint.
    pub waypoint_best_distance: f32,
    /// Distance to the current waypoint as of the last update.
    pub waypoint_last_distance: f32,
    /// Consecutive stall windows without improvement.
    pub waypoint_stall_counter: u32,
    /// Consecutive decisions with near-zero movement.
    pub stuck_counter: u32,
    /// Movement magnitude below which a decision counts toward `stuck_counter`.
    pub stuck_epsilon: f32,
    /// Position as of the last blackboard update.
    pub last_position: Vec2,
    /// Movement magnitude since the last blackboard update.
    pub last_move_delta: f32,
    /// Actor currently targeted, if any.
    pub target_actor_id: Option<ActorId>,
    /// Per-ability tick at which the ability is next usable.
    pub ability_next_ready_tick: HashMap<String, u64>,
    /// Default arrive radius, used when a condition doesn't override it.
    pub default_arrive_radius: f32,
    /// Default pause duration in ticks for `set-timer` without an override.
    pub default_pause_ticks: u64,
    /// Default patrol speed.
    pub default_patrol_speed: f32,
}

impl Default for Blackboard {
    fn default() -> Self {
        Self {
            next_decision_tick: Tick::ZERO,
            state_entered_tick: Tick::ZERO,
            last_decision_tick: Tick::ZERO,
            wait_until_tick: 0,
            waypoint_index: 0,
            last_waypoint_index: 0,
            waypoint_best_distance: f32::MAX,
            waypoint_last_distance: f32::MAX,
            waypoint_stall_counter: 0,
            stuck_counter: 0,
            stuck_epsilon: 0.5,
            last_position: Vec2::ZERO,
            last_move_delta: 0.0,
            target_actor_id: None,
            ability_next_ready_tick: HashMap::new(),
            default_arrive_radius: 12.0,
            default_pause_ticks: 0,
            default_patrol_speed: 1.0,
        }
    }
}

/// A non-player actor driven by the compiled AI executor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Npc {
    /// Stable actor identity.
    pub id: ActorId,
    /// World position.
    pub position: Vec2,
    /// Facing direction.
    pub facing: Facing,
    /// Current health.
    pub health: f32,
    /// Maximum health.
    pub max_health: f32,
    /// Opaque reference into the (out of scope) inventory module.
    pub inventory_ref: Option<u64>,
    /// Opaque reference into the (out of scope) equipment module.
    pub equipment_ref: Option<u64>,
    /// Active status effects, keyed by kind.
    pub status_effects: HashMap<String, StatusEffect>,
    /// Dynamic pathfinding state.
    pub path: Option<PathState>,
    /// Per-ability tick at which the ability is next usable.
    pub ability_cooldowns: HashMap<String, u64>,
    /// Archetype tag, e.g. `"goblin"`, `"rat"`.
    pub archetype: String,
    /// Allocated id of this NPC's compiled AI config.
    pub ai_config_id: u16,
    /// Current state within the compiled AI config.
    pub ai_state_index: u8,
    /// Authored patrol waypoints.
    pub waypoints: Vec<Vec2>,
    /// Spawn / return-to-patrol position.
    pub home: Vec2,
    /// Mutable scratchpad maintained by the AI executor.
    pub blackboard: Blackboard,
}

impl Npc {
    /// True once health has reached zero.
    #[must_use]
    pub fn is_defeated(&self) -> bool {
        self.health <= 0.0
    }

    /// True if `archetype` is (case-insensitively) `"rat"`.
    #[must_use]
    pub fn is_rat(&self) -> bool {
        self.archetype.eq_ignore_ascii_case("rat")
    }
}

/// An axis-aligned rectangular obstacle in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Obstacle {
    /// Minimum corner.
    pub min: Vec2,
    /// Maximum corner.
    pub max: Vec2,
}

impl Obstacle {
    /// True if `point` lies within this obstacle's bounds.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

/// An item lying on the ground.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroundItem {
    /// Stable identity.
    pub id: GroundItemId,
    /// Opaque item-type reference into the (out of scope) inventory module.
    pub item_id: u64,
    /// World position.
    pub position: Vec2,
    /// Stack quantity; zero marks the item as consumed/removed.
    pub quantity: u32,
}

/// World-wide tunables serialized into the join handshake and every
/// keyframe.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldConfig {
    /// World width, in world units.
    pub width: f32,
    /// World height, in world units.
    pub height: f32,
    /// Navigation grid cell size, in world units.
    pub cell_size: f32,
    /// Simulation tick rate, in Hz.
    pub tick_rate: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 1024.0,
            height: 1024.0,
            cell_size: 16.0,
            tick_rate: 15,
        }
    }
}

impl WorldConfig {
    /// Clamps `point` into the playable world bounds, leaving room for an
    /// actor's half-extent on each edge.
    #[must_use]
    pub fn clamp_point(&self, point: Vec2, half_actor: f32) -> Vec2 {
        point.clamp(
            Vec2::new(half_actor, half_actor),
            Vec2::new(self.width - half_actor, self.height - half_actor),
        )
    }
}
