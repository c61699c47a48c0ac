//! Per-tick AI executor: evaluates eligible NPCs' compiled FSMs, applies
//! transitions, runs actions, and returns the commands those actions
//! produced for the (out of scope) movement/ability steps to consume.

use arena_core::nav::NavGrid;
use arena_core::world::{ActorId, Npc, Player, WorldConfig};
use arena_core::{derive_facing, Command, CommandPayload, Prng, Tick, Vec2};
use tracing::{debug, instrument};

use crate::compiled::{ActionKind, CompiledAiConfig, CompiledState, ConditionKind, TargetKind};
use crate::library::AiLibrary;

/// Hard cap on the number of NPCs that receive a full decision in a single
/// [`run_tick`] call. NPCs past the cap still get their blackboard movement
/// bookkeeping updated; only transition evaluation and actions defer to the
/// next eligible tick.
pub const MAX_DECISIONS_PER_TICK: usize = 64;

/// Waypoint-stall threshold past which `reached-waypoint`'s arrive radius
/// starts relaxing.
const STALL_RELAX_THRESHOLD: u32 = 30;
/// Width, in stalled decisions, of one relaxation window.
const STALL_WINDOW_SIZE: u32 = 30;
/// After this many relaxation windows without improvement, the waypoint is
/// considered reached regardless of distance.
const STALL_MAX_WINDOWS: u32 = 3;
/// Cap on the waypoint stall counter so it can't grow unbounded.
const STALL_COUNTER_CAP: u32 = STALL_RELAX_THRESHOLD + STALL_WINDOW_SIZE * STALL_MAX_WINDOWS;
const WAYPOINT_IMPROVEMENT_EPSILON: f32 = 0.1;

/// Ticks a navigation-grid path is trusted before re-planning is allowed.
const PATH_RECALC_COOLDOWN_TICKS: u64 = 8;
/// Maximum candidates sampled for `set-random-destination` before giving up.
const RANDOM_DESTINATION_CANDIDATES: u32 = 6;

/// A read-only snapshot of one NPC's position/archetype, taken before the
/// decision pass so `non-rat-within` can scan siblings without conflicting
/// with the mutable borrow `decide_one` holds on the NPC being decided.
/// Positions don't change during the AI pass itself (movement is a separate
/// world-step concern), so a pre-pass snapshot is exact for this tick.
#[derive(Debug, Clone, Copy)]
struct NpcScan {
    id: ActorId,
    position: Vec2,
    is_rat: bool,
    defeated: bool,
}

/// Runs one decision pass over `npcs`.
///
/// Every NPC gets its movement-bookkeeping blackboard fields refreshed
/// regardless of eligibility; only up to [`MAX_DECISIONS_PER_TICK`] eligible
/// NPCs (in ascending `ActorId` order, for determinism) get a full decision:
/// transition evaluation followed by the resulting state's actions.
///
/// Returns every [`Command`] produced by an executed action, in NPC
/// processing order.
#[instrument(skip_all, fields(tick = tick.0))]
pub fn run_tick(
    library: &AiLibrary,
    nav: &NavGrid,
    world_config: &WorldConfig,
    npcs: &mut [Npc],
    players: &[Player],
    tick: Tick,
    rng: &mut Prng,
) -> Vec<Command> {
    let mut order: Vec<usize> = (0..npcs.len()).collect();
    order.sort_by_key(|&i| npcs[i].id);

    let scan: Vec<NpcScan> = npcs
        .iter()
        .map(|n| NpcScan {
            id: n.id,
            position: n.position,
            is_rat: n.is_rat(),
            defeated: n.is_defeated(),
        })
        .collect();

    let mut commands = Vec::new();
    let mut decided = 0usize;
    let mut deferred = 0usize;

    for idx in order {
        let npc = &mut npcs[idx];
        update_stuck_tracking(npc);
        update_waypoint_tracking(npc);

        if tick.0 < npc.blackboard.next_decision_tick.0 {
            continue;
        }
        if decided >= MAX_DECISIONS_PER_TICK {
            deferred += 1;
            continue;
        }
        let Some(config) = library.get(npc.ai_config_id) else {
            continue;
        };
        decide_one(config, nav, world_config, npc, players, &scan, tick, rng, &mut commands);
        decided += 1;
    }

    if deferred > 0 {
        debug!(deferred, "decision cap reached, deferring NPCs to next tick");
    }

    commands
}

fn update_stuck_tracking(npc: &mut Npc) {
    let moved = npc.position.distance(npc.blackboard.last_position);
    npc.blackboard.last_move_delta = moved;
    npc.blackboard.last_position = npc.position;

    if moved < npc.blackboard.stuck_epsilon {
        npc.blackboard.stuck_counter = npc.blackboard.stuck_counter.saturating_add(1);
    } else {
        npc.blackboard.stuck_counter = 0;
    }
}

fn update_waypoint_tracking(npc: &mut Npc) {
    let Some(&waypoint) = npc.waypoints.get(npc.blackboard.waypoint_index) else {
        return;
    };
    let distance = npc.position.distance(waypoint);
    npc.blackboard.waypoint_last_distance = distance;
    if distance + WAYPOINT_IMPROVEMENT_EPSILON < npc.blackboard.waypoint_best_distance {
        npc.blackboard.waypoint_best_distance = distance;
        npc.blackboard.waypoint_stall_counter = 0;
    } else {
        npc.blackboard.waypoint_stall_counter =
            (npc.blackboard.waypoint_stall_counter + 1).min(STALL_COUNTER_CAP);
    }
}

fn reset_waypoint_tracking(npc: &mut Npc) {
    npc.blackboard.waypoint_best_distance = f32::MAX;
    npc.blackboard.waypoint_last_distance = f32::MAX;
    npc.blackboard.waypoint_stall_counter = 0;
}

#[allow(clippy::too_many_arguments)]
fn decide_one(
    config: &CompiledAiConfig,
    nav: &NavGrid,
    world_config: &WorldConfig,
    npc: &mut Npc,
    players: &[Player],
    scan: &[NpcScan],
    tick: Tick,
    rng: &mut Prng,
    commands: &mut Vec<Command>,
) {
    let mut state_index = npc.ai_state_index;
    let state = &config.states[state_index as usize];

    if let Some((target_state, real)) = evaluate_transitions(config, state, npc, players, scan, tick) {
        if real {
            enter_state(config, npc, target_state, tick);
        }
        state_index = target_state;
    }

    let entering_this_tick = tick == npc.blackboard.state_entered_tick;
    let state = &config.states[state_index as usize];
    for action in &state.actions {
        run_action(
            config,
            nav,
            world_config,
            npc,
            players,
            tick,
            rng,
            action.kind,
            action.param_index,
            entering_this_tick,
            commands,
        );
    }

    npc.blackboard.last_decision_tick = tick;
    npc.blackboard.next_decision_tick = tick.advance(state.cadence_ticks.max(1));
}

fn enter_state(config: &CompiledAiConfig, npc: &mut Npc, target_state: u8, tick: Tick) {
    npc.ai_state_index = target_state;
    npc.blackboard.state_entered_tick = tick;
    reset_waypoint_tracking(npc);

    let entered = &config.states[target_state as usize];
    npc.blackboard.wait_until_tick = if entered.enter_timer_ticks > 0 {
        tick.0 + entered.enter_timer_ticks
    } else {
        0
    };
}

fn evaluate_transitions(
    config: &CompiledAiConfig,
    state: &CompiledState,
    npc: &mut Npc,
    players: &[Player],
    scan: &[NpcScan],
    tick: Tick,
) -> Option<(u8, bool)> {
    for transition in &state.transitions {
        if condition_holds(config, transition.condition, transition.param_index, npc, players, scan, tick) {
            let real = transition.target_state != npc.ai_state_index;
            return Some((transition.target_state, real));
        }
    }
    None
}

/// Nearest living player to `npc`, ties broken toward the smaller `ActorId`.
fn nearest_player(npc: &Npc, players: &[Player]) -> Option<(ActorId, f32)> {
    let mut best: Option<(ActorId, f32)> = None;
    for player in players {
        if player.is_defeated() {
            continue;
        }
        let d = npc.position.distance(player.position);
        let better = match best {
            None => true,
            Some((best_id, best_d)) => d < best_d || (d == best_d && player.id < best_id),
        };
        if better {
            best = Some((player.id, d));
        }
    }
    best
}

/// Nearest living non-rat actor (player or NPC) to `npc`, excluding `npc`
/// itself, ties broken toward the smaller `ActorId`.
fn nearest_non_rat(npc: &Npc, players: &[Player], scan: &[NpcScan]) -> Option<(ActorId, f32)> {
    let mut best = nearest_player(npc, players);
    for sibling in scan {
        if sibling.id == npc.id || sibling.is_rat || sibling.defeated {
            continue;
        }
        let d = npc.position.distance(sibling.position);
        let better = match best {
            None => true,
            Some((best_id, best_d)) => d < best_d || (d == best_d && sibling.id < best_id),
        };
        if better {
            best = Some((sibling.id, d));
        }
    }
    best
}

fn condition_holds(
    config: &CompiledAiConfig,
    condition: ConditionKind,
    param_index: u16,
    npc: &mut Npc,
    players: &[Player],
    scan: &[NpcScan],
    tick: Tick,
) -> bool {
    match condition {
        ConditionKind::ReachedWaypoint => {
            if npc.waypoints.is_empty() {
                return true;
            }
            let params = &config.reached_waypoint_params[param_index as usize];
            let base = params.arrive_radius.unwrap_or(npc.blackboard.default_arrive_radius);
            let stall = npc.blackboard.waypoint_stall_counter;
            if stall > STALL_RELAX_THRESHOLD {
                let window = 1 + (stall - STALL_RELAX_THRESHOLD - 1) / STALL_WINDOW_SIZE;
                if window >= STALL_MAX_WINDOWS {
                    return true;
                }
                let relax = (base / 2.0).max(12.0) * window as f32;
                return npc.blackboard.waypoint_last_distance <= base + relax;
            }
            npc.blackboard.waypoint_last_distance <= base
        }
        ConditionKind::TimerExpired => {
            npc.blackboard.wait_until_tick > 0 && tick.0 >= npc.blackboard.wait_until_tick
        }
        ConditionKind::PlayerWithin => {
            let radius = config.player_within_params[param_index as usize].radius;
            match nearest_player(npc, players) {
                Some((id, distance)) if distance <= radius => {
                    npc.blackboard.target_actor_id = Some(id);
                    true
                }
                _ => false,
            }
        }
        ConditionKind::NonRatWithin => {
            let radius = config.non_rat_within_params[param_index as usize].radius;
            match nearest_non_rat(npc, players, scan) {
                Some((id, distance)) if distance <= radius => {
                    npc.blackboard.target_actor_id = Some(id);
                    true
                }
                _ => false,
            }
        }
        ConditionKind::LostSight => {
            let params = &config.lost_sight_params[param_index as usize];
            match npc.blackboard.target_actor_id {
                None => true,
                Some(target_id) => {
                    let target_pos = players
                        .iter()
                        .find(|p| p.id == target_id)
                        .map(|p| p.position)
                        .or_else(|| scan.iter().find(|s| s.id == target_id).map(|s| s.position));
                    match target_pos {
                        Some(pos) => npc.position.distance(pos) > params.threshold,
                        None => true,
                    }
                }
            }
        }
        ConditionKind::CooldownReady => {
            let params = &config.cooldown_ready_params[param_index as usize];
            match &params.ability {
                None => true,
                Some(ability) => npc
                    .blackboard
                    .ability_next_ready_tick
                    .get(ability)
                    .is_none_or(|&ready_at| tick.0 >= ready_at),
            }
        }
        ConditionKind::Stuck => {
            let params = &config.stuck_params[param_index as usize];
            npc.blackboard.stuck_counter >= params.decisions && npc.blackboard.last_move_delta < params.epsilon
        }
    }
}

fn resolve_target_position(target: TargetKind, npc: &Npc, players: &[Player]) -> Option<Vec2> {
    match target {
        TargetKind::Waypoint => npc.waypoints.get(npc.blackboard.waypoint_index).copied(),
        TargetKind::Player => {
            let target_id = npc.blackboard.target_actor_id?;
            players.iter().find(|p| p.id == target_id).map(|p| p.position)
        }
        TargetKind::Vector(offset) => Some(offset),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_action(
    config: &CompiledAiConfig,
    nav: &NavGrid,
    world_config: &WorldConfig,
    npc: &mut Npc,
    players: &[Player],
    tick: Tick,
    rng: &mut Prng,
    kind: ActionKind,
    param_index: u16,
    entering_this_tick: bool,
    commands: &mut Vec<Command>,
) {
    match kind {
        ActionKind::MoveToward => run_move_toward(config, nav, world_config, npc, players, tick, param_index, commands),
        ActionKind::Face => run_face(config, npc, players, tick, param_index, commands),
        ActionKind::Stop => run_stop(npc, tick, commands),
        ActionKind::UseAbility => run_use_ability(config, world_config, npc, tick, param_index, commands),
        ActionKind::SetTimer => {
            if entering_this_tick {
                let params = &config.set_timer_params[param_index as usize];
                npc.blackboard.wait_until_tick = tick.0 + params.wait_ticks;
            }
        }
        ActionKind::SetWaypoint => {
            if entering_this_tick {
                run_set_waypoint(config, npc, param_index);
            }
        }
        ActionKind::SetRandomDestination => {
            if entering_this_tick {
                run_set_random_destination(config, nav, world_config, npc, tick, rng, param_index);
            }
        }
        ActionKind::MoveAway => run_move_away(config, nav, npc, players, tick, rng, param_index, commands),
    }
}

fn steer_toward(nav: &NavGrid, npc: &mut Npc, target_pos: Vec2, tick: Tick, speed: f32, commands: &mut Vec<Command>) {
    let reached = nav.ensure_path(npc.position, target_pos, tick, PATH_RECALC_COOLDOWN_TICKS, &mut npc.path);
    if !reached {
        return;
    }
    let arrive_radius = npc.blackboard.default_arrive_radius;
    let Some(path) = npc.path.as_mut() else { return };
    if let Some(steer) = NavGrid::follow_path(path, npc.position, arrive_radius) {
        let direction = (steer - npc.position).normalized_or(Vec2::ZERO);
        push_move(npc, tick, direction * speed, commands);
    }
}

fn run_move_toward(
    config: &CompiledAiConfig,
    nav: &NavGrid,
    world_config: &WorldConfig,
    npc: &mut Npc,
    players: &[Player],
    tick: Tick,
    param_index: u16,
    commands: &mut Vec<Command>,
) {
    let params = &config.move_toward_params[param_index as usize];
    if params.target == TargetKind::Player && npc.blackboard.target_actor_id.is_none() {
        commands.push(Command {
            origin_tick: tick,
            actor_id: npc.id,
            issued_at_ms: 0,
            payload: CommandPayload::ClearPath,
        });
        return;
    }

    let raw_target = match params.target {
        TargetKind::Vector(offset) => Some(world_config.clamp_point(npc.position + offset, 0.0)),
        other => resolve_target_position(other, npc, players),
    };
    if let Some(target_pos) = raw_target {
        let speed = npc.blackboard.default_patrol_speed;
        steer_toward(nav, npc, target_pos, tick, speed, commands);
    }
}

fn run_face(
    config: &CompiledAiConfig,
    npc: &mut Npc,
    players: &[Player],
    tick: Tick,
    param_index: u16,
    commands: &mut Vec<Command>,
) {
    let params = &config.face_params[param_index as usize];
    if let Some(target_pos) = resolve_target_position(params.target, npc, players) {
        let direction = target_pos - npc.position;
        npc.facing = derive_facing(direction.x, direction.y);
    }
    commands.push(Command {
        origin_tick: tick,
        actor_id: npc.id,
        issued_at_ms: 0,
        payload: CommandPayload::Move { delta: Vec2::ZERO, facing: npc.facing },
    });
}

fn run_stop(npc: &mut Npc, tick: Tick, commands: &mut Vec<Command>) {
    npc.path = None;
    commands.push(Command {
        origin_tick: tick,
        actor_id: npc.id,
        issued_at_ms: 0,
        payload: CommandPayload::ClearPath,
    });
    commands.push(Command {
        origin_tick: tick,
        actor_id: npc.id,
        issued_at_ms: 0,
        payload: CommandPayload::Move { delta: Vec2::ZERO, facing: npc.facing },
    });
}

fn run_use_ability(
    config: &CompiledAiConfig,
    world_config: &WorldConfig,
    npc: &mut Npc,
    tick: Tick,
    param_index: u16,
    commands: &mut Vec<Command>,
) {
    let params = &config.use_ability_params[param_index as usize];
    let ready = npc
        .blackboard
        .ability_next_ready_tick
        .get(&params.ability)
        .is_none_or(|&ready_at| tick.0 >= ready_at);
    if !ready {
        return;
    }
    let cooldown_ticks = (params.cooldown_seconds * world_config.tick_rate as f32).ceil() as u64;
    npc.blackboard
        .ability_next_ready_tick
        .insert(params.ability.clone(), tick.0 + cooldown_ticks);
    commands.push(Command {
        origin_tick: tick,
        actor_id: npc.id,
        issued_at_ms: 0,
        payload: CommandPayload::Action {
            action: params.ability.clone(),
            target: npc.blackboard.target_actor_id,
            effect_type_id: Some(params.effect_type_id.clone()),
        },
    });
}

fn run_set_waypoint(config: &CompiledAiConfig, npc: &mut Npc, param_index: u16) {
    let params = &config.set_waypoint_params[param_index as usize];
    let count = npc.waypoints.len();
    if count == 0 {
        return;
    }
    if params.index != 0 {
        npc.blackboard.waypoint_index = params.index % count;
    } else if params.advance {
        npc.blackboard.last_waypoint_index = npc.blackboard.waypoint_index;
        npc.blackboard.waypoint_index = (npc.blackboard.waypoint_index + 1) % count;
    } else {
        npc.blackboard.waypoint_index = 0;
    }
    reset_waypoint_tracking(npc);
}

fn run_set_random_destination(
    config: &CompiledAiConfig,
    nav: &NavGrid,
    world_config: &WorldConfig,
    npc: &mut Npc,
    tick: Tick,
    rng: &mut Prng,
    param_index: u16,
) {
    let params = &config.set_random_destination_params[param_index as usize];
    let center = if npc.home == Vec2::ZERO { npc.position } else { npc.home };
    let min_radius = params.min_radius.min(params.radius);
    let max_radius = params.radius.max(params.min_radius);

    for _ in 0..RANDOM_DESTINATION_CANDIDATES {
        let angle = rng.next_range_f32(0.0, std::f32::consts::TAU);
        let radius = rng.next_range_f32(min_radius, max_radius);
        let candidate = world_config.clamp_point(center + Vec2::new(radius * angle.cos(), radius * angle.sin()), 0.0);
        if nav.ensure_path(npc.position, candidate, tick, PATH_RECALC_COOLDOWN_TICKS, &mut npc.path) {
            return;
        }
    }
    npc.path = None;
}

fn run_move_away(
    config: &CompiledAiConfig,
    nav: &NavGrid,
    npc: &mut Npc,
    players: &[Player],
    tick: Tick,
    rng: &mut Prng,
    param_index: u16,
    commands: &mut Vec<Command>,
) {
    let params = &config.move_away_params[param_index as usize];
    let from = resolve_target_position(TargetKind::Player, npc, players).unwrap_or(npc.position);

    let direction = {
        let raw = npc.position - from;
        if raw.length() < f32::EPSILON {
            let angle = rng.next_range_f32(0.0, std::f32::consts::TAU);
            Vec2::new(angle.cos(), angle.sin())
        } else {
            raw.normalized_or(Vec2::new(1.0, 0.0))
        }
    };

    let goal_distance = rng.next_range_f32(params.min_distance.min(params.distance), params.distance.max(params.min_distance));
    let target = npc.position + direction * goal_distance;
    let speed = npc.blackboard.default_patrol_speed;
    steer_toward(nav, npc, target, tick, speed, commands);
}

fn push_move(npc: &mut Npc, tick: Tick, delta: Vec2, commands: &mut Vec<Command>) {
    if delta != Vec2::ZERO {
        npc.facing = derive_facing(delta.x, delta.y);
    }
    commands.push(Command {
        origin_tick: tick,
        actor_id: npc.id,
        issued_at_ms: 0,
        payload: CommandPayload::Move { delta, facing: npc.facing },
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use arena_core::world::{Blackboard, Obstacle, WorldConfig};
    use std::collections::HashMap;

    fn make_npc(id: u64, config_id: u16, waypoints: Vec<Vec2>) -> Npc {
        Npc {
            id: arena_core::world::ActorId(id),
            position: Vec2::ZERO,
            facing: arena_core::Facing::Down,
            health: 10.0,
            max_health: 10.0,
            inventory_ref: None,
            equipment_ref: None,
            status_effects: HashMap::new(),
            path: None,
            ability_cooldowns: HashMap::new(),
            archetype: "goblin".to_string(),
            ai_config_id: config_id,
            ai_state_index: 0,
            waypoints,
            home: Vec2::ZERO,
            blackboard: Blackboard::default(),
        }
    }

    fn nav() -> NavGrid {
        NavGrid::rasterize(&WorldConfig::default(), &[] as &[Obstacle])
    }

    fn make_npc_archetype(id: u64, archetype: &str, config_id: u16, waypoints: Vec<Vec2>) -> Npc {
        let mut npc = make_npc(id, config_id, waypoints);
        npc.archetype = archetype.to_string();
        npc
    }

    #[test]
    fn reaches_waypoint_and_pauses() {
        let library = AiLibrary::load_embedded().unwrap();
        let goblin_id = library.id_for_archetype("goblin").unwrap();
        let config = library.get(goblin_id).unwrap();
        let mut npc = make_npc(1, goblin_id, vec![Vec2::new(1.0, 0.0)]);
        npc.blackboard.default_arrive_radius = config.defaults.arrive_radius;
        npc.blackboard.default_pause_ticks = config.defaults.pause_ticks;
        npc.blackboard.default_patrol_speed = config.defaults.patrol_speed;

        let world_config = WorldConfig::default();
        let grid = nav();
        let mut rng = Prng::from_seed_u64(1);

        let mut npcs = vec![npc];
        let _ = run_tick(&library, &grid, &world_config, &mut npcs, &[], Tick(1), &mut rng);
        assert_eq!(npcs[0].ai_state_index, 1, "goblin should enter pause-at-waypoint");
    }

    #[test]
    fn set_waypoint_index_precedence_overrides_advance() {
        let raw = r#"
archetype: waypoint-precedence-test
initial_state: a
states:
  - name: a
    actions:
      - name: set-waypoint
        advance: true
        index: 2
    transitions:
      - if: timer-expired
        to: a
"#;
        let mut library = AiLibrary::default();
        let config_id = library.compile_str(raw).unwrap();
        let config = library.get(config_id).unwrap();
        assert_eq!(config.set_waypoint_params[0].index, 2);
        assert!(config.set_waypoint_params[0].advance);

        let mut npc = make_npc(
            1,
            config_id,
            vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)],
        );
        npc.blackboard.waypoint_index = 0;

        run_set_waypoint(config, &mut npc, 0);

        // index (2) must win over advance (which would have picked 1).
        assert_eq!(npc.blackboard.waypoint_index, 2);
    }

    #[test]
    fn decisions_are_capped_per_tick_but_bookkeeping_still_runs() {
        let library = AiLibrary::load_embedded().unwrap();
        let goblin_id = library.id_for_archetype("goblin").unwrap();
        let mut npcs: Vec<Npc> = (0..MAX_DECISIONS_PER_TICK + 10)
            .map(|i| make_npc(i as u64, goblin_id, vec![Vec2::new(100.0, 0.0)]))
            .collect();
        let world_config = WorldConfig::default();
        let grid = nav();
        let mut rng = Prng::from_seed_u64(1);

        let before_ticks: Vec<_> = npcs.iter().map(|n| n.blackboard.next_decision_tick).collect();
        let _ = run_tick(&library, &grid, &world_config, &mut npcs, &[], Tick(1), &mut rng);
        let decided = npcs
            .iter()
            .zip(before_ticks.iter())
            .filter(|(n, before)| n.blackboard.next_decision_tick != **before)
            .count();
        assert_eq!(decided, MAX_DECISIONS_PER_TICK);

        // Every NPC, decided or deferred, gets bookkeeping applied.
        assert!(npcs.iter().all(|n| n.blackboard.last_position == Vec2::ZERO));
    }

    #[test]
    fn reached_waypoint_relaxes_then_forces_after_three_stall_windows() {
        let raw = r#"
archetype: stall-test
initial_state: a
defaults:
  arrive_radius: 10.0
states:
  - name: a
    actions: []
    transitions:
      - if: reached-waypoint
        to: b
  - name: b
    actions: []
    transitions:
      - if: timer-expired
        to: b
"#;
        let mut library = AiLibrary::default();
        let config_id = library.compile_str(raw).unwrap();
        let config = library.get(config_id).unwrap();

        let mut npc = make_npc(1, config_id, vec![Vec2::new(50.0, 0.0)]);
        npc.blackboard.default_arrive_radius = config.defaults.arrive_radius;
        npc.position = Vec2::new(20.0, 0.0); // distance 30, far outside radius 10

        // Stall past the relaxation threshold without ever getting closer.
        npc.blackboard.waypoint_stall_counter = STALL_RELAX_THRESHOLD + STALL_WINDOW_SIZE * STALL_MAX_WINDOWS;
        npc.blackboard.waypoint_best_distance = 30.0;
        npc.blackboard.waypoint_last_distance = 30.0;

        let holds = condition_holds(config, ConditionKind::ReachedWaypoint, 0, &mut npc, &[], &[], Tick(1));
        assert!(holds, "after 3 stall windows the waypoint must be treated as reached");
    }

    #[test]
    fn move_away_flees_the_resolved_target_not_a_random_direction() {
        let raw = r#"
archetype: flee-test
initial_state: a
states:
  - name: a
    actions:
      - name: move-away
        min_distance: 20.0
        distance: 20.0
    transitions:
      - if: timer-expired
        to: a
"#;
        let mut library = AiLibrary::default();
        let config_id = library.compile_str(raw).unwrap();
        let config = library.get(config_id).unwrap();

        let mut npc = make_npc(1, config_id, vec![]);
        npc.position = Vec2::ZERO;
        npc.blackboard.target_actor_id = Some(ActorId(2));
        npc.blackboard.default_patrol_speed = 5.0;

        let threat = Player {
            id: ActorId(2),
            position: Vec2::new(10.0, 0.0),
            facing: arena_core::Facing::Down,
            health: 10.0,
            max_health: 10.0,
            inventory_ref: None,
            equipment_ref: None,
            status_effects: HashMap::new(),
            last_heartbeat_ms: 0,
            last_rtt_ms: 0,
            path: None,
            ability_cooldowns: HashMap::new(),
        };

        let grid = nav();
        let mut rng = Prng::from_seed_u64(1);
        let mut commands = Vec::new();
        run_move_away(config, &grid, &mut npc, &[threat], Tick(1), &mut rng, 0, &mut commands);

        // Threat sits at +x; fleeing must push the NPC toward -x, never
        // toward a random direction while a real target is resolvable.
        let Some(Command { payload: CommandPayload::Move { delta, .. }, .. }) = commands.first() else {
            panic!("move-away should emit a move command when a path is found");
        };
        assert!(delta.x < 0.0, "flee direction should point away from the threat, got {delta:?}");
    }

    #[test]
    fn non_rat_within_detects_nearby_goblin_and_triggers_flee() {
        let library = AiLibrary::load_embedded().unwrap();
        let rat_id = library.id_for_archetype("rat").unwrap();
        let goblin_id = library.id_for_archetype("goblin").unwrap();
        let config = library.get(rat_id).unwrap();

        let mut rat = make_npc_archetype(1, "rat", rat_id, vec![Vec2::new(500.0, 0.0)]);
        rat.blackboard.default_arrive_radius = config.defaults.arrive_radius;
        rat.blackboard.default_pause_ticks = config.defaults.pause_ticks;
        rat.blackboard.default_patrol_speed = config.defaults.patrol_speed;
        rat.position = Vec2::ZERO;

        let goblin = make_npc_archetype(2, "goblin", goblin_id, vec![]);

        let world_config = WorldConfig::default();
        let grid = nav();
        let mut rng = Prng::from_seed_u64(1);

        let mut npcs = vec![rat, goblin];
        npcs[1].position = Vec2::new(40.0, 0.0); // well within the 96.0 detection radius
        let _ = run_tick(&library, &grid, &world_config, &mut npcs, &[], Tick(1), &mut rng);

        assert_eq!(npcs[0].ai_state_index, 2, "rat should flee from the nearby goblin");
        assert_eq!(npcs[0].blackboard.target_actor_id, Some(ActorId(2)));
    }
}
