//! The authoritative per-tick world step (spec.md §4.5 step 3): applies
//! staged commands, runs the AI pass, advances the effect manager, prunes
//! expired status effects, and reaps defeated actors, staging every
//! resulting patch and effect event directly into the [`Journal`].

use std::collections::{BTreeMap, HashMap, HashSet};

use arena_ai::{run_tick as run_ai_tick, AiLibrary};
use arena_core::nav::{self, NavGrid};
use arena_core::telemetry::{Telemetry, TelemetrySnapshot};
use arena_core::world::{ActorId, GroundItem, GroundItemId, Npc, Obstacle, Player, WorldConfig};
use arena_core::{Command, CommandPayload, EntityId, Facing, Patch, PatchKind, Prng, Tick, Vec2};
use arena_effects::definition::DeliveryKind;
use arena_effects::{EffectHost, EffectInstanceId, EffectIntent, EffectManager, LifecycleEvent};
use arena_journal::{DropReason, Journal, Keyframe};

/// Half an actor's collision footprint, used to keep a whole actor (not just
/// its center point) inside the playable world bounds.
const HALF_ACTOR_EXTENT: f32 = 8.0;

/// Ticks a navigation-grid path is trusted before re-planning is allowed for
/// a player- or transport-initiated path request. Mirrors the AI executor's
/// own cooldown for AI-initiated paths.
const PATH_RECALC_COOLDOWN_TICKS: u64 = 8;

/// Owns every piece of live simulation state plus the collaborators the
/// per-tick step needs: the navigation grid, the compiled AI library, the
/// effect manager, and the deterministic RNG stream.
pub struct World {
    players: BTreeMap<ActorId, Player>,
    npcs: BTreeMap<ActorId, Npc>,
    ground_items: BTreeMap<GroundItemId, GroundItem>,
    obstacles: Vec<Obstacle>,
    world_config: WorldConfig,
    nav: NavGrid,
    ai_library: AiLibrary,
    effects: EffectManager,
    rng: Prng,
    tick: Tick,
}

impl World {
    /// Builds an empty world (no players, no NPCs) with a navigation grid
    /// rasterized from `obstacles`.
    #[must_use]
    pub fn new(world_config: WorldConfig, obstacles: Vec<Obstacle>, ai_library: AiLibrary, effects: EffectManager, rng: Prng) -> Self {
        let nav = NavGrid::rasterize(&world_config, &obstacles);
        Self {
            players: BTreeMap::new(),
            npcs: BTreeMap::new(),
            ground_items: BTreeMap::new(),
            obstacles,
            world_config,
            nav,
            ai_library,
            effects,
            rng,
            tick: Tick::ZERO,
        }
    }

    /// The tick of the most recent [`Self::advance`] call.
    #[must_use]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// World tunables, as handed out in the join handshake and every keyframe.
    #[must_use]
    pub fn world_config(&self) -> WorldConfig {
        self.world_config
    }

    /// Adds or replaces a player.
    pub fn insert_player(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    /// Adds or replaces an NPC.
    pub fn insert_npc(&mut self, npc: Npc) {
        self.npcs.insert(npc.id, npc);
    }

    /// Removes a player (e.g. on disconnect), returning it if present.
    pub fn remove_player(&mut self, id: ActorId) -> Option<Player> {
        self.players.remove(&id)
    }

    /// True if `id` names a live player or NPC.
    #[must_use]
    pub fn actor_exists(&self, id: ActorId) -> bool {
        self.players.contains_key(&id) || self.npcs.contains_key(&id)
    }

    /// A read-only view of a live player, for join handshakes and diagnostics.
    #[must_use]
    pub fn player(&self, id: ActorId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Static obstacle layout, for join handshakes.
    #[must_use]
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Ground items present right now, for join handshakes.
    #[must_use]
    pub fn ground_items(&self) -> impl Iterator<Item = &GroundItem> {
        self.ground_items.values()
    }

    /// Every currently-live actor id (player or NPC), for the broadcast
    /// alive-set filter.
    #[must_use]
    pub fn alive_actor_ids(&self) -> HashSet<ActorId> {
        self.players.keys().chain(self.npcs.keys()).copied().collect()
    }

    /// Every currently-live ground item id, for the broadcast alive-set filter.
    #[must_use]
    pub fn alive_ground_item_ids(&self) -> HashSet<GroundItemId> {
        self.ground_items.keys().copied().collect()
    }

    /// Every currently-live effect instance id, for the broadcast alive-set
    /// filter.
    #[must_use]
    pub fn alive_effect_instance_ids(&self) -> HashSet<EffectInstanceId> {
        self.effects.instances().keys().copied().collect()
    }

    /// A full snapshot suitable for recording as a journal keyframe.
    #[must_use]
    pub fn keyframe(&self, sequence: u64, recorded_at_ms: u64) -> Keyframe {
        Keyframe {
            tick: self.tick,
            sequence,
            recorded_at_ms,
            players: self.players.values().cloned().collect(),
            npcs: self.npcs.values().cloned().collect(),
            obstacles: self.obstacles.clone(),
            ground_items: self.ground_items.values().cloned().collect(),
            world_config: self.world_config,
        }
    }

    /// Runs one simulation step: applies `commands`, runs the AI pass,
    /// advances the effect manager, prunes expired status effects, and
    /// reaps defeated actors. Every patch and effect event produced is
    /// staged directly into `journal`.
    pub fn advance(&mut self, commands: Vec<Command>, tick: Tick, now_ms: u64, journal: &mut Journal, telemetry: &Telemetry) {
        self.tick = tick;

        for command in commands {
            self.apply_player_command(command, tick, journal);
        }

        self.run_ai_pass(tick, journal);
        self.run_effects(tick, now_ms, journal, telemetry);
        self.prune_status_effects(tick);
        self.reap_defeated(journal);
    }

    fn apply_player_command(&mut self, command: Command, tick: Tick, journal: &mut Journal) {
        let actor_id = command.actor_id;
        match command.payload {
            CommandPayload::Move { delta, facing } => {
                let Some(player) = self.players.get_mut(&actor_id) else { return };
                let entity_id = EntityId::Actor(actor_id);
                apply_move(&mut player.position, &mut player.facing, &self.world_config, entity_id, delta, facing, journal);
            }
            CommandPayload::Action { action, target, effect_type_id } => {
                if self.players.contains_key(&actor_id) {
                    queue_ability_intent(&mut self.effects, actor_id, action, target, effect_type_id, tick);
                }
            }
            CommandPayload::Heartbeat { sent_at_ms } => {
                let Some(player) = self.players.get_mut(&actor_id) else { return };
                player.last_heartbeat_ms = command.issued_at_ms;
                player.last_rtt_ms = u32::try_from(command.issued_at_ms.saturating_sub(sent_at_ms)).unwrap_or(u32::MAX);
            }
            CommandPayload::SetPath { target } => {
                let Some(player) = self.players.get_mut(&actor_id) else { return };
                let from = player.position;
                self.nav.ensure_path(from, target, tick, PATH_RECALC_COOLDOWN_TICKS, &mut player.path);
            }
            CommandPayload::ClearPath => {
                if let Some(player) = self.players.get_mut(&actor_id) {
                    nav::clear_path(&mut player.path);
                }
            }
        }
    }

    /// Materializes NPCs/players into contiguous slices for the AI executor,
    /// runs one decision pass, writes mutated NPCs back, then applies every
    /// command the pass produced.
    ///
    /// The executor mutates an NPC's `facing` field directly for any action
    /// that changes it (see `arena-ai::executor::push_move`/`run_face`), so
    /// by the time its commands are applied here `npc.facing` already holds
    /// the *new* value. Patch emission needs the facing as of the start of
    /// this tick to decide whether a `Facing` patch is warranted, so a
    /// snapshot is taken before the pass runs and used in place of the
    /// (already-updated) live field.
    fn run_ai_pass(&mut self, tick: Tick, journal: &mut Journal) {
        let npc_ids: Vec<ActorId> = self.npcs.keys().copied().collect();
        if npc_ids.is_empty() {
            return;
        }

        let mut facing_baseline: BTreeMap<ActorId, Facing> = self.npcs.iter().map(|(id, npc)| (*id, npc.facing)).collect();
        let mut npcs: Vec<Npc> = npc_ids.iter().map(|id| self.npcs[id].clone()).collect();
        let players: Vec<Player> = self.players.values().cloned().collect();

        let commands = run_ai_tick(&self.ai_library, &self.nav, &self.world_config, &mut npcs, &players, tick, &mut self.rng);

        for (id, npc) in npc_ids.into_iter().zip(npcs) {
            self.npcs.insert(id, npc);
        }

        for command in commands {
            self.apply_npc_command(command, tick, &mut facing_baseline, journal);
        }
    }

    fn apply_npc_command(&mut self, command: Command, tick: Tick, facing_baseline: &mut BTreeMap<ActorId, Facing>, journal: &mut Journal) {
        let actor_id = command.actor_id;
        match command.payload {
            CommandPayload::Move { delta, facing } => {
                let Some(npc) = self.npcs.get_mut(&actor_id) else { return };
                let entity_id = EntityId::Actor(actor_id);
                let baseline = facing_baseline.entry(actor_id).or_insert(npc.facing);
                apply_move(&mut npc.position, baseline, &self.world_config, entity_id, delta, facing, journal);
            }
            CommandPayload::Action { action, target, effect_type_id } => {
                if self.npcs.contains_key(&actor_id) {
                    queue_ability_intent(&mut self.effects, actor_id, action, target, effect_type_id, tick);
                }
            }
            CommandPayload::SetPath { target } => {
                let Some(npc) = self.npcs.get_mut(&actor_id) else { return };
                let from = npc.position;
                self.nav.ensure_path(from, target, tick, PATH_RECALC_COOLDOWN_TICKS, &mut npc.path);
            }
            CommandPayload::ClearPath => {
                if let Some(npc) = self.npcs.get_mut(&actor_id) {
                    nav::clear_path(&mut npc.path);
                }
            }
            CommandPayload::Heartbeat { .. } => {}
        }
    }

    fn run_effects(&mut self, tick: Tick, now_ms: u64, journal: &mut Journal, telemetry: &Telemetry) {
        let mut host = WorldEffectHost {
            players: &self.players,
            npcs: &self.npcs,
        };
        let mut events = Vec::new();
        self.effects.run_tick(&mut host, tick, now_ms, telemetry, |event| events.push(event));
        for event in events {
            record_lifecycle_event(journal, telemetry, event);
        }
    }

    fn prune_status_effects(&mut self, tick: Tick) {
        for player in self.players.values_mut() {
            player.status_effects.retain(|_, effect| effect.expires_at.0 > tick.0);
        }
        for npc in self.npcs.values_mut() {
            npc.status_effects.retain(|_, effect| effect.expires_at.0 > tick.0);
        }
    }

    fn reap_defeated(&mut self, journal: &mut Journal) {
        let dead_players: Vec<ActorId> = self
            .players
            .iter()
            .filter(|(_, player)| player.is_defeated())
            .map(|(id, _)| *id)
            .collect();
        for id in dead_players {
            self.players.remove(&id);
            journal.append_patch(Patch::new(EntityId::Actor(id), PatchKind::PlayerRemoved));
        }

        let dead_npcs: Vec<ActorId> = self.npcs.iter().filter(|(_, npc)| npc.is_defeated()).map(|(id, _)| *id).collect();
        for id in dead_npcs {
            self.npcs.remove(&id);
            journal.append_patch(Patch::new(EntityId::Actor(id), PatchKind::NpcRemoved));
        }
    }
}

/// Applies one `Move` command: the Intent patch always fires; Position and
/// Facing patches fire only when they actually change (spec.md §3 "Patch").
fn apply_move(
    position: &mut Vec2,
    facing_ref: &mut Facing,
    world_config: &WorldConfig,
    entity_id: EntityId,
    delta: Vec2,
    requested_facing: Facing,
    journal: &mut Journal,
) {
    journal.append_patch(Patch::new(entity_id, PatchKind::Intent { delta }));

    let new_position = world_config.clamp_point(*position + delta, HALF_ACTOR_EXTENT);
    if new_position != *position {
        *position = new_position;
        journal.append_patch(Patch::new(entity_id, PatchKind::Position(new_position)));
    }

    if requested_facing != *facing_ref {
        *facing_ref = requested_facing;
        journal.append_patch(Patch::new(entity_id, PatchKind::Facing(requested_facing)));
    }
}

/// Resolves an `Action` command to an effect intent and queues it. `action`
/// itself is the fallback type-id for a player-issued action that never
/// resolved one explicitly (spec.md's `CommandPayload::Action` doc comment).
fn queue_ability_intent(effects: &mut EffectManager, source: ActorId, action: String, target: Option<ActorId>, effect_type_id: Option<String>, tick: Tick) {
    let type_id = effect_type_id.unwrap_or(action);
    let delivery_kind = effects.definition(&type_id).map_or(DeliveryKind::Target, |def| def.delivery_kind);
    effects.enqueue_intent(EffectIntent {
        entry_id: format!("{}-{}-{type_id}", source.0, tick.0),
        type_id,
        delivery_kind,
        source_actor_id: source,
        target_actor_id: target,
        geometry_override: None,
        duration_ticks_override: None,
        tick_cadence_override: None,
        params: HashMap::new(),
    });
}

fn record_lifecycle_event(journal: &mut Journal, telemetry: &Telemetry, event: LifecycleEvent) {
    match event {
        LifecycleEvent::Spawn { instance_id, tick, instance } => {
            journal.record_effect_spawn(instance_id, tick, instance);
        }
        LifecycleEvent::Update { instance_id, tick, delivery, behavior, params } => {
            let sequence = journal.next_effect_sequence(instance_id);
            if let Err(reason) = journal.record_effect_update(instance_id, tick, sequence, delivery, behavior, params) {
                telemetry.update(|t| bump_drop_counter(t, reason));
            }
        }
        LifecycleEvent::End { instance_id, tick, reason } => {
            let sequence = journal.next_effect_sequence(instance_id);
            if let Err(drop_reason) = journal.record_effect_end(instance_id, tick, sequence, reason) {
                telemetry.update(|t| bump_drop_counter(t, drop_reason));
            }
        }
    }
}

fn bump_drop_counter(snapshot: &mut TelemetrySnapshot, reason: DropReason) {
    match reason {
        DropReason::UnknownId => snapshot.journal_drop_unknown_id += 1,
        DropReason::NonMonotonic => snapshot.journal_drop_non_monotonic += 1,
        DropReason::UpdateAfterEnd => snapshot.journal_drop_update_after_end += 1,
    }
}

/// Resolves the world queries the effect manager needs against the live
/// player/NPC maps. Cancel/zone-change signals are out of scope (no console
/// command or zone model exists in this core), so both always read `false`.
struct WorldEffectHost<'a> {
    players: &'a BTreeMap<ActorId, Player>,
    npcs: &'a BTreeMap<ActorId, Npc>,
}

impl EffectHost for WorldEffectHost<'_> {
    fn actor_position(&self, actor_id: ActorId) -> Option<Vec2> {
        self.players
            .get(&actor_id)
            .map(|p| p.position)
            .or_else(|| self.npcs.get(&actor_id).map(|n| n.position))
    }

    fn actor_alive(&self, actor_id: ActorId) -> bool {
        self.players
            .get(&actor_id)
            .map(|p| !p.is_defeated())
            .or_else(|| self.npcs.get(&actor_id).map(|n| !n.is_defeated()))
            .unwrap_or(false)
    }

    fn cancel_requested(&self, _instance_id: EffectInstanceId) -> bool {
        false
    }

    fn zone_changed(&self, _instance_id: EffectInstanceId) -> bool {
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use arena_core::telemetry::Telemetry;
    use arena_core::world::Blackboard;
    use arena_effects::HookRegistry;
    use std::collections::HashMap as Map;

    fn empty_world() -> World {
        let library = AiLibrary::load_embedded().unwrap();
        let effects = EffectManager::new(arena_effects::load_embedded_definitions().unwrap(), HookRegistry::new());
        World::new(WorldConfig::default(), Vec::new(), library, effects, Prng::from_seed_u64(1))
    }

    fn player(id: u64) -> Player {
        Player {
            id: ActorId(id),
            position: Vec2::new(500.0, 500.0),
            facing: Facing::Down,
            health: 10.0,
            max_health: 10.0,
            inventory_ref: None,
            equipment_ref: None,
            status_effects: Map::new(),
            last_heartbeat_ms: 0,
            last_rtt_ms: 0,
            path: None,
            ability_cooldowns: Map::new(),
        }
    }

    fn move_command(actor: ActorId, tick: u64, delta: Vec2, facing: Facing) -> Command {
        Command {
            origin_tick: Tick(tick),
            actor_id: actor,
            issued_at_ms: tick * 100,
            payload: CommandPayload::Move { delta, facing },
        }
    }

    fn heartbeat_command(actor: ActorId, tick: u64) -> Command {
        Command {
            origin_tick: Tick(tick),
            actor_id: actor,
            issued_at_ms: tick * 100,
            payload: CommandPayload::Heartbeat { sent_at_ms: tick * 100 },
        }
    }

    /// Reproduces spec.md §8 scenario 1: one player, 6 ticks of
    /// `[right, down, left, up, stop, heartbeat]`, total patches = 13, zero
    /// journal (effect) events.
    #[test]
    fn deterministic_six_tick_harness_produces_thirteen_patches() {
        let mut world = empty_world();
        let actor = ActorId(1);
        world.insert_player(player(1));

        let mut journal = Journal::new(8, 0);
        let telemetry = Telemetry::new();

        let script = [
            move_command(actor, 1, Vec2::new(10.0, 0.0), Facing::Right),
            move_command(actor, 2, Vec2::new(0.0, 10.0), Facing::Down),
            move_command(actor, 3, Vec2::new(-10.0, 0.0), Facing::Left),
            move_command(actor, 4, Vec2::new(0.0, -10.0), Facing::Up),
            move_command(actor, 5, Vec2::ZERO, Facing::Up),
            heartbeat_command(actor, 6),
        ];

        for (i, command) in script.into_iter().enumerate() {
            let tick = Tick(i as u64 + 1);
            world.advance(vec![command], tick, tick.0 * 100, &mut journal, &telemetry);
        }

        let patches = journal.drain_patches();
        assert_eq!(patches.len(), 13);

        let effect_events = journal.drain_effect_events();
        assert!(effect_events.spawns.is_empty());
        assert!(effect_events.updates.is_empty());
        assert!(effect_events.ends.is_empty());
    }

    #[test]
    fn move_command_always_emits_intent_even_when_stationary() {
        let mut world = empty_world();
        world.insert_player(player(1));
        let mut journal = Journal::new(8, 0);
        let telemetry = Telemetry::new();

        world.advance(
            vec![move_command(ActorId(1), 1, Vec2::ZERO, Facing::Down)],
            Tick(1),
            0,
            &mut journal,
            &telemetry,
        );

        let patches = journal.drain_patches();
        assert_eq!(patches, vec![Patch::new(EntityId::Actor(ActorId(1)), PatchKind::Intent { delta: Vec2::ZERO })]);
    }

    #[test]
    fn position_clamps_to_world_bounds_and_still_reports_the_clamped_delta() {
        let mut world = empty_world();
        let mut edge_player = player(1);
        edge_player.position = Vec2::new(4.0, 4.0);
        world.insert_player(edge_player);
        let mut journal = Journal::new(8, 0);
        let telemetry = Telemetry::new();

        world.advance(
            vec![move_command(ActorId(1), 1, Vec2::new(-100.0, -100.0), Facing::Left)],
            Tick(1),
            0,
            &mut journal,
            &telemetry,
        );

        let patches = journal.drain_patches();
        let position_patch = patches
            .iter()
            .find(|p| matches!(p.kind, PatchKind::Position(_)))
            .expect("clamped move still changes position");
        assert_eq!(position_patch.kind, PatchKind::Position(Vec2::new(HALF_ACTOR_EXTENT, HALF_ACTOR_EXTENT)));
    }

    #[test]
    fn defeated_player_is_removed_with_a_terminal_patch() {
        let mut world = empty_world();
        let mut dying = player(1);
        dying.health = 0.0;
        world.insert_player(dying);
        let mut journal = Journal::new(8, 0);
        let telemetry = Telemetry::new();

        world.advance(Vec::new(), Tick(1), 0, &mut journal, &telemetry);

        let patches = journal.drain_patches();
        assert_eq!(patches, vec![Patch::new(EntityId::Actor(ActorId(1)), PatchKind::PlayerRemoved)]);
        assert!(!world.actor_exists(ActorId(1)));
    }

    #[test]
    fn ability_action_with_explicit_effect_type_id_spawns_that_effect() {
        let mut world = empty_world();
        world.insert_player(player(1));
        let mut journal = Journal::new(8, 0);
        let telemetry = Telemetry::new();

        let action = Command {
            origin_tick: Tick(1),
            actor_id: ActorId(1),
            issued_at_ms: 0,
            payload: CommandPayload::Action {
                action: "club-smash".to_string(),
                target: None,
                effect_type_id: Some("goblin-club-smash".to_string()),
            },
        };
        world.advance(vec![action], Tick(1), 1_000, &mut journal, &telemetry);

        let events = journal.drain_effect_events();
        assert_eq!(events.spawns.len(), 1);
    }

    #[test]
    fn npc_ai_pass_applies_its_own_commands_and_updates_facing_baseline_correctly() {
        let mut world = empty_world();
        let library = AiLibrary::load_embedded().unwrap();
        let goblin_id = library.id_for_archetype("goblin").unwrap();
        let npc = Npc {
            id: ActorId(42),
            position: Vec2::new(500.0, 500.0),
            facing: Facing::Down,
            health: 10.0,
            max_health: 10.0,
            inventory_ref: None,
            equipment_ref: None,
            status_effects: Map::new(),
            path: None,
            ability_cooldowns: Map::new(),
            archetype: "goblin".to_string(),
            ai_config_id: goblin_id,
            ai_state_index: 0,
            waypoints: vec![Vec2::new(520.0, 500.0)],
            home: Vec2::new(500.0, 500.0),
            blackboard: Blackboard::default(),
        };
        world.insert_npc(npc);
        let mut journal = Journal::new(8, 0);
        let telemetry = Telemetry::new();

        world.advance(Vec::new(), Tick(1), 0, &mut journal, &telemetry);

        // A goblin patrolling toward a waypoint to its east should turn to
        // face right and report an Intent patch; it must not silently lose
        // the patch because the executor already flipped `npc.facing`.
        let patches = journal.drain_patches();
        assert!(patches.iter().any(|p| matches!(p.kind, PatchKind::Intent { .. })));
    }
}
