//! Compact, integer-keyed compiled form of an archetype's AI, produced by
//! [`crate::library::compile`]. No string lookups occur during execution:
//! every action/transition stores only a kind enum and an index into the
//! matching parameter array.

use arena_core::Vec2;

/// Resolves a `move-toward`/`face` target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetKind {
    /// The NPC's current authored waypoint.
    Waypoint,
    /// The blackboard's current target actor.
    Player,
    /// A fixed offset from the NPC's current position.
    Vector(Vec2),
}

/// Discriminant for a compiled action; the payload lives in the matching
/// parameter array, addressed by [`CompiledAction::param_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// See spec.md §4.1 `move-toward`.
    MoveToward,
    /// See spec.md §4.1 `stop`.
    Stop,
    /// See spec.md §4.1 `use-ability`.
    UseAbility,
    /// See spec.md §4.1 `face`.
    Face,
    /// See spec.md §4.1 `set-timer`.
    SetTimer,
    /// See spec.md §4.1 `set-waypoint`.
    SetWaypoint,
    /// See spec.md §4.1 `set-random-destination`.
    SetRandomDestination,
    /// See spec.md §4.1 `move-away`.
    MoveAway,
}

/// Discriminant for a compiled transition condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    /// See spec.md §4.1 `reached-waypoint`.
    ReachedWaypoint,
    /// See spec.md §4.1 `timer-expired`.
    TimerExpired,
    /// See spec.md §4.1 `player-within`.
    PlayerWithin,
    /// See spec.md §4.1 `non-rat-within`.
    NonRatWithin,
    /// See spec.md §4.1 `lost-sight`.
    LostSight,
    /// See spec.md §4.1 `cooldown-ready`.
    CooldownReady,
    /// See spec.md §4.1 `stuck`.
    Stuck,
}

/// A compiled action: a kind plus an index into its parameter array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledAction {
    /// Which action to run.
    pub kind: ActionKind,
    /// Index into the config's parameter array for `kind`.
    pub param_index: u16,
}

/// A compiled transition: a condition, its parameter index, and the target
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledTransition {
    /// Which condition to evaluate.
    pub condition: ConditionKind,
    /// Index into the config's parameter array for `condition`.
    pub param_index: u16,
    /// Destination state index. Always `< state_count`.
    pub target_state: u8,
}

/// A compiled state.
#[derive(Debug, Clone)]
pub struct CompiledState {
    /// Minimum ticks between decisions while in this state (always >= 1).
    pub cadence_ticks: u64,
    /// Ticks to hold `wait-until-tick` after a real transition into this
    /// state. Zero disables the enter-timer.
    pub enter_timer_ticks: u64,
    /// Actions run, in authored order, on every decision.
    pub actions: Vec<CompiledAction>,
    /// Transitions evaluated in authored order.
    pub transitions: Vec<CompiledTransition>,
}

/// Blackboard tunable defaults baked into a compiled config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackboardDefaults {
    /// Default `reached-waypoint` arrive radius.
    pub arrive_radius: f32,
    /// Default `set-timer` wait, in ticks.
    pub pause_ticks: u64,
    /// Default patrol movement speed.
    pub patrol_speed: f32,
}

impl Default for BlackboardDefaults {
    fn default() -> Self {
        Self {
            arrive_radius: 12.0,
            pause_ticks: 0,
            patrol_speed: 1.0,
        }
    }
}

/// `move-toward` / `face` parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetParams {
    /// The resolved target.
    pub target: TargetKind,
}

/// `use-ability` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct UseAbilityParams {
    /// Ability name (also the blackboard cooldown-map key).
    pub ability: String,
    /// Effect type-id this ability spawns.
    pub effect_type_id: String,
    /// Cooldown, in seconds (converted to ticks at execution time using the
    /// active tick rate).
    pub cooldown_seconds: f32,
}

/// `set-timer` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetTimerParams {
    /// Ticks to wait.
    pub wait_ticks: u64,
}

/// `set-waypoint` parameters. See spec.md §9 for the `advance`/`index`
/// precedence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetWaypointParams {
    /// Whether to advance the waypoint index by one.
    pub advance: bool,
    /// Explicit waypoint index; non-zero values take precedence over
    /// `advance`.
    pub index: usize,
}

/// `set-random-destination` parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnulusParams {
    /// Inner sampling radius.
    pub min_radius: f32,
    /// Outer sampling radius.
    pub radius: f32,
}

/// `move-away` parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FleeParams {
    /// Minimum flee distance.
    pub min_distance: f32,
    /// Maximum flee distance.
    pub distance: f32,
}

/// `player-within` / `non-rat-within` parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusParams {
    /// Detection radius.
    pub radius: f32,
}

/// `lost-sight` parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdParams {
    /// Loss-of-track distance.
    pub threshold: f32,
}

/// `cooldown-ready` parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AbilityRefParams {
    /// Ability name; `None` means "no ability" (always holds).
    pub ability: Option<String>,
}

/// `stuck` parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StuckParams {
    /// Consecutive near-zero-movement decisions required.
    pub decisions: u32,
    /// Movement magnitude below which a decision counts as stalled.
    pub epsilon: f32,
}

/// `reached-waypoint` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArriveOverrideParams {
    /// Overrides the default arrive radius when present.
    pub arrive_radius: Option<f32>,
}

/// The compiled form of one authored archetype.
#[derive(Debug, Clone)]
pub struct CompiledAiConfig {
    /// Allocated id for this config.
    pub id: u16,
    /// Compiled states, addressed by index.
    pub states: Vec<CompiledState>,
    /// Index of the state an NPC starts in.
    pub initial_state: u8,
    /// Default blackboard tunables.
    pub defaults: BlackboardDefaults,

    /// `move-toward` parameter pool.
    pub move_toward_params: Vec<TargetParams>,
    /// `face` parameter pool.
    pub face_params: Vec<TargetParams>,
    /// `use-ability` parameter pool.
    pub use_ability_params: Vec<UseAbilityParams>,
    /// `set-timer` parameter pool.
    pub set_timer_params: Vec<SetTimerParams>,
    /// `set-waypoint` parameter pool.
    pub set_waypoint_params: Vec<SetWaypointParams>,
    /// `set-random-destination` parameter pool.
    pub set_random_destination_params: Vec<AnnulusParams>,
    /// `move-away` parameter pool.
    pub move_away_params: Vec<FleeParams>,

    /// `player-within` parameter pool.
    pub player_within_params: Vec<RadiusParams>,
    /// `non-rat-within` parameter pool.
    pub non_rat_within_params: Vec<RadiusParams>,
    /// `lost-sight` parameter pool.
    pub lost_sight_params: Vec<ThresholdParams>,
    /// `cooldown-ready` parameter pool.
    pub cooldown_ready_params: Vec<AbilityRefParams>,
    /// `stuck` parameter pool.
    pub stuck_params: Vec<StuckParams>,
    /// `reached-waypoint` parameter pool.
    pub reached_waypoint_params: Vec<ArriveOverrideParams>,
}

impl CompiledAiConfig {
    /// Number of compiled states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}
