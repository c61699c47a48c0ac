//! Loads authored archetype documents and compiles them into
//! [`crate::compiled::CompiledAiConfig`]s, addressable by a small integer id.
//!
//! Compilation is two-pass: the first pass assigns every state a dense index
//! within its archetype (and checks for duplicate names), the second pass
//! resolves every action/condition name and transition target against that
//! index, appending each node's parameters to the matching parallel array.

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::authoring::ArchetypeDoc;
use crate::compiled::{
    AbilityRefParams, ActionKind, AnnulusParams, ArriveOverrideParams, BlackboardDefaults,
    CompiledAction, CompiledAiConfig, CompiledState, CompiledTransition, ConditionKind,
    FleeParams, RadiusParams, SetTimerParams, SetWaypointParams, StuckParams, TargetKind,
    TargetParams, ThresholdParams, UseAbilityParams,
};
use crate::error::AiError;

/// Archetype documents embedded in the binary at build time. Each entry is
/// `(archetype tag, raw YAML)`; `AiLibrary::load_embedded` compiles all of
/// them in one pass.
pub const EMBEDDED_ARCHETYPES: &[(&str, &str)] = &[
    ("goblin", include_str!("../archetypes/goblin.yaml")),
    ("rat", include_str!("../archetypes/rat.yaml")),
];

/// A compiled set of archetype AI configs, addressable by tag or id.
#[derive(Debug, Default)]
pub struct AiLibrary {
    configs: Vec<CompiledAiConfig>,
    by_archetype: FxHashMap<String, u16>,
}

impl AiLibrary {
    /// Parses and compiles every embedded archetype document.
    ///
    /// # Errors
    /// Returns the first compile failure encountered.
    pub fn load_embedded() -> Result<Self, AiError> {
        let mut library = Self::default();
        for (archetype, raw) in EMBEDDED_ARCHETYPES {
            let doc: ArchetypeDoc = serde_yaml::from_str(raw)?;
            debug_assert_eq!(doc.archetype, *archetype);
            library.compile_and_insert(doc)?;
        }
        info!(count = library.configs.len(), "compiled embedded archetypes");
        Ok(library)
    }

    /// Parses and compiles a single archetype document from raw YAML.
    ///
    /// # Errors
    /// Returns [`AiError::InvalidDocument`] on a YAML/schema mismatch, or a
    /// compile error (duplicate state, unknown transition target, unknown
    /// action/condition name, empty state list).
    pub fn compile_str(&mut self, raw: &str) -> Result<u16, AiError> {
        let doc: ArchetypeDoc = serde_yaml::from_str(raw)?;
        self.compile_and_insert(doc)
    }

    fn compile_and_insert(&mut self, doc: ArchetypeDoc) -> Result<u16, AiError> {
        let id = u16::try_from(self.configs.len()).unwrap_or(u16::MAX);
        let config = compile_archetype(&doc, id)?;
        self.by_archetype.insert(doc.archetype.clone(), id);
        self.configs.push(config);
        debug!(archetype = %doc.archetype, id, "compiled archetype");
        Ok(id)
    }

    /// Looks up a compiled config by allocated id.
    #[must_use]
    pub fn get(&self, id: u16) -> Option<&CompiledAiConfig> {
        self.configs.get(id as usize)
    }

    /// Looks up a compiled config's id by archetype tag.
    ///
    /// # Errors
    /// Returns [`AiError::UnknownArchetype`] if no document declared `tag`.
    pub fn id_for_archetype(&self, tag: &str) -> Result<u16, AiError> {
        self.by_archetype
            .get(tag)
            .copied()
            .ok_or_else(|| AiError::UnknownArchetype(tag.to_string()))
    }

    /// Number of compiled configs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// True if no archetypes have been compiled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

fn compile_archetype(doc: &ArchetypeDoc, id: u16) -> Result<CompiledAiConfig, AiError> {
    if doc.states.is_empty() {
        return Err(AiError::EmptyStates(doc.archetype.clone()));
    }
    if doc.states.len() > 255 {
        return Err(AiError::TooManyStates {
            archetype: doc.archetype.clone(),
            count: doc.states.len(),
        });
    }

    let mut state_index: FxHashMap<String, u8> = FxHashMap::default();
    for state in &doc.states {
        let key = state.name.to_lowercase();
        let next = u8::try_from(state_index.len()).unwrap_or(u8::MAX);
        if state_index.insert(key, next).is_some() {
            return Err(AiError::DuplicateState {
                archetype: doc.archetype.clone(),
                state: state.name.clone(),
            });
        }
    }

    let initial_state = *state_index
        .get(&doc.initial_state.to_lowercase())
        .ok_or_else(|| AiError::UnknownInitialState {
            archetype: doc.archetype.clone(),
            state: doc.initial_state.clone(),
        })?;

    let defaults = BlackboardDefaults {
        arrive_radius: doc.defaults.arrive_radius.unwrap_or(12.0),
        pause_ticks: doc.defaults.pause_ticks.unwrap_or(0),
        patrol_speed: doc.defaults.patrol_speed.unwrap_or(1.0),
    };

    let mut config = CompiledAiConfig {
        id,
        states: Vec::with_capacity(doc.states.len()),
        initial_state,
        defaults,
        move_toward_params: Vec::new(),
        face_params: Vec::new(),
        use_ability_params: Vec::new(),
        set_timer_params: Vec::new(),
        set_waypoint_params: Vec::new(),
        set_random_destination_params: Vec::new(),
        move_away_params: Vec::new(),
        player_within_params: Vec::new(),
        non_rat_within_params: Vec::new(),
        lost_sight_params: Vec::new(),
        cooldown_ready_params: Vec::new(),
        stuck_params: Vec::new(),
        reached_waypoint_params: Vec::new(),
    };

    for state_doc in &doc.states {
        let mut actions = Vec::with_capacity(state_doc.actions.len());
        for action_doc in &state_doc.actions {
            actions.push(compile_action(doc, state_doc.name.as_str(), action_doc, &mut config)?);
        }

        let mut transitions = Vec::with_capacity(state_doc.transitions.len());
        for transition_doc in &state_doc.transitions {
            let target_state = *state_index
                .get(&transition_doc.to.to_lowercase())
                .ok_or_else(|| AiError::UnknownTransitionTarget {
                    archetype: doc.archetype.clone(),
                    state: state_doc.name.clone(),
                    to: transition_doc.to.clone(),
                })?;
            transitions.push(compile_transition(
                doc,
                state_doc.name.as_str(),
                transition_doc,
                target_state,
                &mut config,
            )?);
        }

        config.states.push(CompiledState {
            cadence_ticks: state_doc.cadence_ticks.max(1),
            enter_timer_ticks: state_doc.enter_timer_ticks,
            actions,
            transitions,
        });
    }

    Ok(config)
}

fn resolve_target(target: Option<&str>, offset: Option<[f32; 2]>) -> TargetKind {
    match target.map(str::to_lowercase).as_deref() {
        Some("player") => TargetKind::Player,
        Some("vector") => {
            let [x, y] = offset.unwrap_or([0.0, 0.0]);
            TargetKind::Vector(arena_core::Vec2::new(x, y))
        }
        _ => TargetKind::Waypoint,
    }
}

fn compile_action(
    doc: &ArchetypeDoc,
    state: &str,
    action: &crate::authoring::ActionDoc,
    config: &mut CompiledAiConfig,
) -> Result<CompiledAction, AiError> {
    let name = action.name.to_lowercase();
    let (kind, param_index) = match name.as_str() {
        "move-toward" => {
            let idx = config.move_toward_params.len();
            config.move_toward_params.push(TargetParams {
                target: resolve_target(action.target.as_deref(), action.offset),
            });
            (ActionKind::MoveToward, idx)
        }
        "stop" => (ActionKind::Stop, 0),
        "face" => {
            let idx = config.face_params.len();
            config.face_params.push(TargetParams {
                target: resolve_target(action.target.as_deref(), action.offset),
            });
            (ActionKind::Face, idx)
        }
        "use-ability" => {
            let idx = config.use_ability_params.len();
            config.use_ability_params.push(UseAbilityParams {
                ability: action.ability.clone().unwrap_or_default(),
                effect_type_id: action.effect_type_id.clone().unwrap_or_default(),
                cooldown_seconds: action.cooldown_seconds.unwrap_or(0.0),
            });
            (ActionKind::UseAbility, idx)
        }
        "set-timer" => {
            let idx = config.set_timer_params.len();
            config.set_timer_params.push(SetTimerParams {
                wait_ticks: action.wait_ticks.unwrap_or(config.defaults.pause_ticks),
            });
            (ActionKind::SetTimer, idx)
        }
        "set-waypoint" => {
            let idx = config.set_waypoint_params.len();
            config.set_waypoint_params.push(SetWaypointParams {
                advance: action.advance.unwrap_or(false),
                index: action.index.unwrap_or(0),
            });
            (ActionKind::SetWaypoint, idx)
        }
        "set-random-destination" => {
            let idx = config.set_random_destination_params.len();
            config.set_random_destination_params.push(AnnulusParams {
                min_radius: action.min_radius.unwrap_or(0.0),
                radius: action.radius.unwrap_or(0.0),
            });
            (ActionKind::SetRandomDestination, idx)
        }
        "move-away" => {
            let idx = config.move_away_params.len();
            config.move_away_params.push(FleeParams {
                min_distance: action.min_distance.unwrap_or(0.0),
                distance: action.distance.unwrap_or(0.0),
            });
            (ActionKind::MoveAway, idx)
        }
        other => {
            return Err(AiError::UnknownNodeKind {
                archetype: doc.archetype.clone(),
                state: state.to_string(),
                kind: "action",
                name: other.to_string(),
            })
        }
    };

    Ok(CompiledAction {
        kind,
        param_index: u16::try_from(param_index).unwrap_or(u16::MAX),
    })
}

fn compile_transition(
    doc: &ArchetypeDoc,
    state: &str,
    transition: &crate::authoring::TransitionDoc,
    target_state: u8,
    config: &mut CompiledAiConfig,
) -> Result<CompiledTransition, AiError> {
    let name = transition.condition.to_lowercase();
    let (condition, param_index) = match name.as_str() {
        "reached-waypoint" => {
            let idx = config.reached_waypoint_params.len();
            config.reached_waypoint_params.push(ArriveOverrideParams {
                arrive_radius: transition.arrive_radius,
            });
            (ConditionKind::ReachedWaypoint, idx)
        }
        "timer-expired" => (ConditionKind::TimerExpired, 0),
        "player-within" => {
            let idx = config.player_within_params.len();
            config.player_within_params.push(RadiusParams {
                radius: transition.radius.unwrap_or(4.0),
            });
            (ConditionKind::PlayerWithin, idx)
        }
        "non-rat-within" => {
            let idx = config.non_rat_within_params.len();
            config.non_rat_within_params.push(RadiusParams {
                radius: transition.radius.unwrap_or(4.0),
            });
            (ConditionKind::NonRatWithin, idx)
        }
        "lost-sight" => {
            let idx = config.lost_sight_params.len();
            config.lost_sight_params.push(ThresholdParams {
                threshold: transition.threshold.unwrap_or(8.0),
            });
            (ConditionKind::LostSight, idx)
        }
        "cooldown-ready" => {
            let idx = config.cooldown_ready_params.len();
            config.cooldown_ready_params.push(AbilityRefParams {
                ability: transition.ability.clone(),
            });
            (ConditionKind::CooldownReady, idx)
        }
        "stuck" => {
            let idx = config.stuck_params.len();
            config.stuck_params.push(StuckParams {
                decisions: transition.decisions.unwrap_or(3),
                epsilon: transition.epsilon.unwrap_or(0.5),
            });
            (ConditionKind::Stuck, idx)
        }
        other => {
            return Err(AiError::UnknownNodeKind {
                archetype: doc.archetype.clone(),
                state: state.to_string(),
                kind: "condition",
                name: other.to_string(),
            })
        }
    };

    Ok(CompiledTransition {
        condition,
        param_index: u16::try_from(param_index).unwrap_or(u16::MAX),
        target_state,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn embedded_archetypes_compile() {
        let library = AiLibrary::load_embedded().expect("embedded archetypes must compile");
        assert_eq!(library.len(), 2);
        let goblin_id = library.id_for_archetype("goblin").unwrap();
        let goblin = library.get(goblin_id).unwrap();
        assert_eq!(goblin.state_count(), 5);
    }

    #[test]
    fn duplicate_state_name_is_rejected() {
        let raw = r#"
archetype: broken
initial_state: a
states:
  - name: a
    transitions:
      - if: timer-expired
        to: a
  - name: a
    transitions:
      - if: timer-expired
        to: a
"#;
        let mut library = AiLibrary::default();
        let err = library.compile_str(raw).unwrap_err();
        assert!(matches!(err, AiError::DuplicateState { .. }));
    }

    #[test]
    fn unknown_initial_state_is_rejected() {
        let raw = r#"
archetype: broken
initial_state: nope
states:
  - name: a
    transitions: []
"#;
        let mut library = AiLibrary::default();
        let err = library.compile_str(raw).unwrap_err();
        assert!(matches!(err, AiError::UnknownInitialState { .. }));
    }

    #[test]
    fn too_many_states_is_rejected() {
        let mut raw = String::from("archetype: huge\ninitial_state: s0\nstates:\n");
        for i in 0..=255 {
            raw.push_str(&format!("  - name: s{i}\n    transitions:\n      - if: timer-expired\n        to: s0\n"));
        }
        let mut library = AiLibrary::default();
        let err = library.compile_str(&raw).unwrap_err();
        assert!(matches!(err, AiError::TooManyStates { count: 256, .. }));
    }

    #[test]
    fn unknown_transition_target_is_rejected() {
        let raw = r#"
archetype: broken
initial_state: a
states:
  - name: a
    transitions:
      - if: timer-expired
        to: nowhere
"#;
        let mut library = AiLibrary::default();
        let err = library.compile_str(raw).unwrap_err();
        assert!(matches!(err, AiError::UnknownTransitionTarget { .. }));
    }

    #[test]
    fn unknown_action_name_is_rejected() {
        let raw = r#"
archetype: broken
initial_state: a
states:
  - name: a
    actions:
      - name: teleport
    transitions:
      - if: timer-expired
        to: a
"#;
        let mut library = AiLibrary::default();
        let err = library.compile_str(raw).unwrap_err();
        assert!(matches!(err, AiError::UnknownNodeKind { kind: "action", .. }));
    }

    #[test]
    fn set_waypoint_params_preserve_index_over_advance() {
        let raw = r#"
archetype: waypoint-test
initial_state: a
states:
  - name: a
    actions:
      - name: set-waypoint
        advance: true
        index: 3
    transitions:
      - if: timer-expired
        to: a
"#;
        let mut library = AiLibrary::default();
        let id = library.compile_str(raw).unwrap();
        let config = library.get(id).unwrap();
        let params = &config.set_waypoint_params[0];
        assert!(params.advance);
        assert_eq!(params.index, 3);
    }
}
