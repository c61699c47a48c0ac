//! Authoring-format (YAML) documents for NPC archetypes.
//!
//! The authoring schema mirrors the teacher's HTN `Method` documents: one
//! flat struct per authored node with `#[serde(default)]` fields covering
//! every action/condition's parameters, resolved to a specific compiled
//! variant at load time rather than a tagged enum at the YAML layer.

use serde::{Deserialize, Serialize};

/// One authored NPC archetype: its ordered states, actions, and
/// transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchetypeDoc {
    /// Archetype tag, e.g. `"goblin"`.
    pub archetype: String,
    /// Name of the state entered on spawn.
    pub initial_state: String,
    /// Ordered states; order only affects readability, not dispatch (states
    /// are addressed by compiled index after loading).
    pub states: Vec<StateDoc>,
    /// Default blackboard tunables, used when a condition/action omits an
    /// override.
    #[serde(default)]
    pub defaults: DefaultsDoc,
}

/// One authored state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDoc {
    /// Unique (within this archetype) state name.
    pub name: String,
    /// Minimum ticks between decisions while in this state. Treated as 1 if
    /// omitted or zero.
    #[serde(default)]
    pub cadence_ticks: u64,
    /// Ticks to hold `wait-until-tick` for after entering this state via a
    /// real transition. Zero means no enter-timer.
    #[serde(default)]
    pub enter_timer_ticks: u64,
    /// Actions executed, in order, on every decision in this state.
    #[serde(default)]
    pub actions: Vec<ActionDoc>,
    /// Transitions evaluated in order; the first whose condition holds is
    /// taken.
    #[serde(default)]
    pub transitions: Vec<TransitionDoc>,
}

/// One authored action. `name` is resolved case-insensitively at compile
/// time; unused fields for a given action kind are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDoc {
    /// Action name, e.g. `"move-toward"`.
    pub name: String,
    /// `move-toward`/`face` target kind: `"waypoint"`, `"player"`, or
    /// `"vector"`.
    #[serde(default)]
    pub target: Option<String>,
    /// `move-toward(target=vector)`: offset from the NPC's current position.
    #[serde(default)]
    pub offset: Option<[f32; 2]>,
    /// `use-ability`: ability name.
    #[serde(default)]
    pub ability: Option<String>,
    /// `use-ability`: effect type-id the ability spawns.
    #[serde(default)]
    pub effect_type_id: Option<String>,
    /// `use-ability`: cooldown in seconds.
    #[serde(default)]
    pub cooldown_seconds: Option<f32>,
    /// `set-timer`: ticks to wait.
    #[serde(default)]
    pub wait_ticks: Option<u64>,
    /// `set-waypoint`: advance the waypoint index by one.
    #[serde(default)]
    pub advance: Option<bool>,
    /// `set-waypoint`: jump to an explicit waypoint index. A non-zero value
    /// takes precedence over `advance` (see spec.md §9).
    #[serde(default)]
    pub index: Option<usize>,
    /// `set-random-destination`/`move-away`: inner sampling radius.
    #[serde(default)]
    pub min_radius: Option<f32>,
    /// `set-random-destination`: outer sampling radius.
    #[serde(default)]
    pub radius: Option<f32>,
    /// `move-away`: minimum flee distance.
    #[serde(default)]
    pub min_distance: Option<f32>,
    /// `move-away`: maximum flee distance.
    #[serde(default)]
    pub distance: Option<f32>,
}

/// One authored transition. `if` is resolved case-insensitively at compile
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionDoc {
    /// Condition name, e.g. `"player-within"`.
    #[serde(rename = "if")]
    pub condition: String,
    /// `player-within`/`non-rat-within`: detection radius.
    #[serde(default)]
    pub radius: Option<f32>,
    /// `reached-waypoint`: override arrive radius.
    #[serde(default)]
    pub arrive_radius: Option<f32>,
    /// `lost-sight`: loss-of-track distance.
    #[serde(default)]
    pub threshold: Option<f32>,
    /// `cooldown-ready`: ability name, or omitted/`"none"` to always hold.
    #[serde(default)]
    pub ability: Option<String>,
    /// `stuck`: decisions of near-zero movement before this holds.
    #[serde(default)]
    pub decisions: Option<u32>,
    /// `stuck`: movement magnitude below which a decision counts as stalled.
    #[serde(default)]
    pub epsilon: Option<f32>,
    /// Destination state name.
    pub to: String,
}

/// Default blackboard tunables for an archetype.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsDoc {
    /// Default `reached-waypoint` arrive radius.
    #[serde(default)]
    pub arrive_radius: Option<f32>,
    /// Default `set-timer` wait, in ticks.
    #[serde(default)]
    pub pause_ticks: Option<u64>,
    /// Default patrol movement speed.
    #[serde(default)]
    pub patrol_speed: Option<f32>,
}
