//! The tick loop / hub (spec.md §4.5): owns the world and journal behind a
//! single lock, stages commands off the tick thread, decides keyframe
//! cadence, filters patches against the alive set, assembles the broadcast
//! envelope, and fans it out to every subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use arena_ai::AiLibrary;
use arena_core::telemetry::Telemetry;
use arena_core::world::{ActorId, Obstacle, Player, WorldConfig};
use arena_core::{Command, CommandPayload, Facing, RootSeed, Tick, Vec2};
use arena_effects::{EffectManager, HookRegistry};
use arena_effects::definition::EndPolicy;
use arena_journal::{filter_against_alive_set, EffectEvent, Journal};
use arena_proto::envelope::{EffectTrigger, EnvelopeHeader, JoinAck, StateEnvelope, StateSnapshot, PROTOCOL_VERSION};
use arena_proto::inbound::InboundMessage;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{HubConfig, OVERRUN_RATIO_ALARM, OVERRUN_STREAK_ALARM, WRITE_DEADLINE_MS};
use crate::error::HubError;
use crate::keyframe_service::{self, KeyframeResponse};
use crate::stage::CommandStage;
use crate::subscriber::{Subscriber, SubscriberId, SubscriberRegistry};
use crate::world::World;

/// Default health assigned to a freshly joined player. Not specified by the
/// spec's data model beyond "health, max-health"; the economy/combat-balance
/// module that would normally own this default is out of scope.
const DEFAULT_PLAYER_HEALTH: f32 = 100.0;

struct HubState {
    world: World,
    journal: Journal,
}

/// Owns the authoritative simulation and every collaborator the tick loop
/// needs: the world, the journal, the subscriber registry, the command
/// stage, and the atomics that coordinate keyframe cadence and overrun
/// alarms across the tick thread and connection handlers (spec.md §5).
pub struct Hub {
    state: Mutex<HubState>,
    telemetry: Arc<Telemetry>,
    subscribers: SubscriberRegistry,
    commands: CommandStage,
    config: HubConfig,
    sequence: AtomicU64,
    last_keyframe_tick: AtomicU64,
    last_keyframe_sequence: AtomicU64,
    forced_keyframe: AtomicBool,
    overrun_streak: AtomicU32,
    overrun_alarm: AtomicBool,
    next_actor_id: AtomicU64,
}

impl Hub {
    /// Builds a hub from the embedded AI archetype library and effect
    /// definition table, with an empty world.
    ///
    /// # Errors
    /// Returns [`HubError`] if either embedded table fails to compile
    /// (spec.md §4.2/§9 "global init" — startup failure here is fatal).
    pub fn new(config: HubConfig, world_config: WorldConfig, obstacles: Vec<Obstacle>, seed: &RootSeed) -> Result<Self, HubError> {
        let ai_library = AiLibrary::load_embedded()?;
        let effects = EffectManager::new(arena_effects::load_embedded_definitions()?, HookRegistry::new());
        let rng = seed.derive("world");
        let world = World::new(world_config, obstacles, ai_library, effects, rng);
        let journal = Journal::new(config.keyframe_capacity, config.keyframe_max_age_ms);
        Ok(Self {
            state: Mutex::new(HubState { world, journal }),
            telemetry: Arc::new(Telemetry::new()),
            subscribers: SubscriberRegistry::new(),
            commands: CommandStage::new(),
            config,
            sequence: AtomicU64::new(0),
            last_keyframe_tick: AtomicU64::new(0),
            last_keyframe_sequence: AtomicU64::new(0),
            forced_keyframe: AtomicBool::new(true),
            overrun_streak: AtomicU32::new(0),
            overrun_alarm: AtomicBool::new(false),
            next_actor_id: AtomicU64::new(1),
        })
    }

    /// Shared telemetry counters, for transport-facing diagnostics endpoints.
    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// The subscriber registry, for transport-side connection registration.
    #[must_use]
    pub fn subscribers(&self) -> &SubscriberRegistry {
        &self.subscribers
    }

    /// Configured tunables.
    #[must_use]
    pub fn config(&self) -> HubConfig {
        self.config
    }

    /// Handles a join handshake: allocates an actor id, inserts a fresh
    /// player at the world's center, and returns the handshake payload.
    /// Lifecycle event arrays are intentionally absent; the first state
    /// broadcast carries the initial keyframe (spec.md §6 "Join").
    pub fn join(&self, now_ms: u64) -> JoinAck {
        let actor_id = ActorId(self.next_actor_id.fetch_add(1, Ordering::Relaxed));
        let mut state = self.state.lock();
        let world_config = state.world.world_config();
        let player = Player {
            id: actor_id,
            position: Vec2::new(world_config.width / 2.0, world_config.height / 2.0),
            facing: Facing::Down,
            health: DEFAULT_PLAYER_HEALTH,
            max_health: DEFAULT_PLAYER_HEALTH,
            inventory_ref: None,
            equipment_ref: None,
            status_effects: HashMap::new(),
            last_heartbeat_ms: now_ms,
            last_rtt_ms: 0,
            path: None,
            ability_cooldowns: HashMap::new(),
        };
        state.world.insert_player(player.clone());
        let obstacles = state.world.obstacles().to_vec();
        let ground_items = state.world.ground_items().copied().collect();

        JoinAck {
            protocol_version: PROTOCOL_VERSION,
            actor_id,
            actor_snapshot: player,
            obstacles,
            ground_items,
            world_config,
            resync: true,
            keyframe_interval: self.config.keyframe_interval,
        }
    }

    /// Removes a disconnected player and schedules a forced keyframe for the
    /// clients that remain (spec.md §7 "Transport" error handling).
    pub fn disconnect(&self, actor_id: ActorId, subscriber_id: SubscriberId) {
        self.state.lock().world.remove_player(actor_id);
        self.subscribers.remove(subscriber_id);
        self.forced_keyframe.store(true, Ordering::Relaxed);
    }

    /// Validates `command.actor_id` against the live actor set and stages it
    /// for the next tick (spec.md §4.5 "Command enqueue").
    ///
    /// # Errors
    /// Returns [`HubError::UnknownActor`] if no player or NPC exists with
    /// that id; the command is not staged.
    pub fn enqueue_command(&self, command: Command) -> Result<(), HubError> {
        if !self.state.lock().world.actor_exists(command.actor_id) {
            return Err(HubError::UnknownActor(command.actor_id));
        }
        self.commands.push(command);
        Ok(())
    }

    /// Translates one inbound wire message into a [`Command`], or `None` for
    /// `RequestKeyframe` (serviced out of band by
    /// [`Self::handle_keyframe_request`]) (spec.md §6 "Inbound messages").
    #[must_use]
    pub fn translate_inbound(actor_id: ActorId, message: &InboundMessage, tick: Tick, now_ms: u64) -> Option<Command> {
        let payload = match message {
            InboundMessage::Input { dx, dy, facing, .. } => CommandPayload::Move {
                delta: Vec2::new(*dx, *dy),
                facing: *facing,
            },
            InboundMessage::Path { x, y } => CommandPayload::SetPath { target: Vec2::new(*x, *y) },
            InboundMessage::CancelPath => CommandPayload::ClearPath,
            InboundMessage::Action { action, target } => CommandPayload::Action {
                action: action.clone(),
                target: *target,
                effect_type_id: None,
            },
            InboundMessage::Heartbeat { sent_at } => CommandPayload::Heartbeat { sent_at_ms: *sent_at },
            InboundMessage::RequestKeyframe { .. } => return None,
        };
        Some(Command {
            origin_tick: tick,
            actor_id,
            issued_at_ms: now_ms,
            payload,
        })
    }

    /// Services an on-demand keyframe request under the world lock (spec.md
    /// §4.6).
    #[must_use]
    pub fn handle_keyframe_request(&self, subscriber: &Subscriber, sequence: u64, now_ms: u64) -> KeyframeResponse {
        let state = self.state.lock();
        keyframe_service::handle_keyframe_request(subscriber, sequence, now_ms, &state.journal, &self.telemetry)
    }

    /// Runs one simulation step and assembles the resulting broadcast
    /// envelope (spec.md §4.5 steps 1-8). Does not perform the fan-out
    /// itself; see [`Self::broadcast`]. Takes `now_ms` explicitly so the
    /// deterministic harness can drive it with substituted wall-clock values
    /// (spec.md §8 "Determinism").
    pub fn run_tick(&self, tick: Tick, now_ms: u64) -> StateEnvelope {
        let commands = self.commands.drain();
        let mut state = self.state.lock();
        state.world.advance(commands, tick, now_ms, &mut state.journal, &self.telemetry);

        let alive_actors = state.world.alive_actor_ids();
        let alive_ground_items = state.world.alive_ground_item_ids();
        let alive_effects = state.world.alive_effect_instance_ids();

        // Step 5: the forced-next flag (from a prior resync, disconnect, or
        // overrun alarm) is consumed atomically here, before this tick's own
        // resync hint (if any) sets it again for the *following* tick.
        let forced_this_tick = self.forced_keyframe.swap(false, Ordering::AcqRel);
        let last_kf_tick = self.last_keyframe_tick.load(Ordering::Relaxed);
        let due = tick.0.saturating_sub(last_kf_tick) >= u64::from(self.config.keyframe_interval);
        let include_keyframe = forced_this_tick || due;

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        let snapshot = include_keyframe.then(|| {
            let frame = state.world.keyframe(sequence, now_ms);
            let outcome = state.journal.record_keyframe(frame.clone(), now_ms);
            self.telemetry.record_keyframe_window(
                outcome.size as u64,
                outcome.oldest_sequence.unwrap_or(sequence),
                outcome.newest_sequence,
            );
            self.last_keyframe_tick.store(tick.0, Ordering::Relaxed);
            self.last_keyframe_sequence.store(sequence, Ordering::Relaxed);
            StateSnapshot {
                players: frame.players,
                npcs: frame.npcs,
                obstacles: frame.obstacles,
                ground_items: frame.ground_items,
                world_config: frame.world_config,
            }
        });

        let raw_patches = state.journal.drain_patches();
        let patches = filter_against_alive_set(raw_patches, &alive_actors, &alive_ground_items, &alive_effects);

        let effect_events = state.journal.drain_effect_events();

        let effect_triggers = Self::derive_effect_triggers(&effect_events.spawns);

        // "Resync scheduling": consuming the hint here forces the *next*
        // message's keyframe and flags *this* message as a resync.
        let resync = state.journal.consume_resync_hint().is_some();
        if resync {
            self.telemetry.update(|t| t.resync_hints_raised += 1);
            self.forced_keyframe.store(true, Ordering::Relaxed);
        }

        drop(state);

        StateEnvelope {
            header: EnvelopeHeader {
                version: PROTOCOL_VERSION,
                tick,
                sequence,
                keyframe_sequence: self.last_keyframe_sequence.load(Ordering::Relaxed),
                server_time_ms: now_ms,
                resync,
                keyframe_interval: self.config.keyframe_interval,
            },
            snapshot,
            patches,
            effect_triggers,
            effect_spawned: effect_events.spawns,
            effect_update: effect_events.updates,
            effect_ended: effect_events.ends,
            effect_seq_cursors: effect_events.cursors,
        }
    }

    /// Lifts `EndPolicy::Instant` spawns into lightweight one-shot triggers
    /// (spec.md §6 "State stream" — `effect-triggers`), so a client that
    /// doesn't track the full effect lifecycle still sees the cue. Does not
    /// remove anything from `spawns`; a lifecycle-tracking client still sees
    /// the matching spawn/end pair.
    fn derive_effect_triggers(spawns: &[EffectEvent]) -> Vec<EffectTrigger> {
        spawns
            .iter()
            .filter_map(|event| match event {
                EffectEvent::Spawn { instance_id, tick, instance, .. } if instance.end_policy == EndPolicy::Instant => {
                    Some(EffectTrigger {
                        instance_id: *instance_id,
                        type_id: instance.type_id.clone(),
                        tick: *tick,
                        owner_actor_id: instance.owner_actor_id,
                        position: instance.delivery.motion.position,
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Encodes `envelope` once and fans it out to every subscriber,
    /// disconnecting any whose write exceeds the write deadline or whose
    /// channel has closed, and scheduling a forced keyframe for the
    /// survivors (spec.md §4.5 step 9, §5 "Cancellation and timeouts").
    pub async fn broadcast(&self, envelope: &StateEnvelope) {
        let frame = match arena_proto::wire::encode_frame(envelope) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(%error, "failed to encode broadcast envelope, dropping this tick's message");
                return;
            }
        };
        self.telemetry.record_broadcast(frame.len() as u64, envelope.patches.len() as u64);

        let mut disconnected = Vec::new();
        for subscriber in self.subscribers.snapshot() {
            let sender = subscriber.sender();
            let outcome = tokio::time::timeout(Duration::from_millis(WRITE_DEADLINE_MS), sender.send(frame.clone())).await;
            if !matches!(outcome, Ok(Ok(()))) {
                disconnected.push(subscriber.id);
            }
        }
        if !disconnected.is_empty() {
            for id in disconnected {
                self.subscribers.remove(id);
            }
            self.forced_keyframe.store(true, Ordering::Relaxed);
        }
    }

    /// Runs the fixed-rate tick loop until `shutdown` reports `true`
    /// (spec.md §4.5, §5 "Cancellation and timeouts"). The tick rate is
    /// read once from the world's configuration at startup.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let tick_rate = self.state.lock().world.world_config().tick_rate.max(1);
        let budget = Duration::from_millis(1000 / u64::from(tick_rate));
        let mut ticker = interval(budget);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut tick = Tick::ZERO;

        info!(tick_rate, budget_ms = budget.as_millis() as u64, "hub tick loop starting");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("hub tick loop shutting down");
                        return;
                    }
                    continue;
                }
            }

            let started = Instant::now();
            tick = tick.next();
            let now_ms = wall_clock_ms();

            let envelope = self.run_tick(tick, now_ms);
            self.broadcast(&envelope).await;

            let elapsed = started.elapsed();
            self.telemetry.record_tick(elapsed > budget);
            self.note_tick_duration(elapsed, budget);
        }
    }

    /// Step 10: tracks the overrun streak and ratio, raising the alarm once
    /// per sustained overrun and resetting it once ticks recover.
    fn note_tick_duration(&self, elapsed: Duration, budget: Duration) {
        if elapsed <= budget {
            self.overrun_streak.store(0, Ordering::Relaxed);
            self.overrun_alarm.store(false, Ordering::Relaxed);
            return;
        }

        let streak = self.overrun_streak.fetch_add(1, Ordering::Relaxed) + 1;
        let ratio = elapsed.as_secs_f32() / budget.as_secs_f32().max(f32::EPSILON);
        let should_alarm = streak >= OVERRUN_STREAK_ALARM || ratio >= OVERRUN_RATIO_ALARM;
        if should_alarm && !self.overrun_alarm.swap(true, Ordering::AcqRel) {
            self.telemetry.update(|t| t.overrun_alarms += 1);
            self.forced_keyframe.store(true, Ordering::Relaxed);
            warn!(
                streak,
                ratio,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = budget.as_millis() as u64,
                "tick budget overrun alarm raised"
            );
        }
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use arena_core::{CommandPayload, EntityId, Facing, PatchKind};

    fn hub() -> Hub {
        Hub::new(HubConfig::default(), WorldConfig::default(), Vec::new(), &RootSeed::from_str_seed("hub-tests")).unwrap()
    }

    #[test]
    fn join_assigns_sequential_ids_and_a_resync_flagged_handshake() {
        let hub = hub();
        let first = hub.join(0);
        let second = hub.join(0);
        assert_eq!(first.actor_id, ActorId(1));
        assert_eq!(second.actor_id, ActorId(2));
        assert!(first.resync);
        assert_eq!(first.keyframe_interval, HubConfig::default().keyframe_interval);
    }

    #[test]
    fn unknown_actor_command_is_rejected_and_never_staged() {
        let hub = hub();
        let command = Command {
            origin_tick: Tick(1),
            actor_id: ActorId(999),
            issued_at_ms: 0,
            payload: CommandPayload::Heartbeat { sent_at_ms: 0 },
        };
        let error = hub.enqueue_command(command).unwrap_err();
        assert!(matches!(error, HubError::UnknownActor(ActorId(999))));
    }

    #[test]
    fn first_tick_always_carries_a_keyframe() {
        let hub = hub();
        hub.join(0);
        let envelope = hub.run_tick(Tick(1), 0);
        assert!(envelope.is_keyframe());
        assert_eq!(envelope.header.sequence, 1);
        assert_eq!(envelope.header.keyframe_sequence, 1);
    }

    #[test]
    fn keyframe_interval_of_one_keyframes_every_tick() {
        let config = HubConfig {
            keyframe_interval: 1,
            ..HubConfig::default()
        };
        let hub = Hub::new(config, WorldConfig::default(), Vec::new(), &RootSeed::from_str_seed("interval-one")).unwrap();
        hub.join(0);
        for tick in 1..=5u64 {
            let envelope = hub.run_tick(Tick(tick), tick * 100);
            assert!(envelope.is_keyframe(), "tick {tick} should carry a keyframe");
        }
    }

    #[test]
    fn sequence_and_tick_advance_by_one_each_broadcast() {
        let hub = hub();
        hub.join(0);
        let first = hub.run_tick(Tick(1), 0);
        let second = hub.run_tick(Tick(2), 100);
        assert_eq!(second.header.tick.0, first.header.tick.0 + 1);
        assert_eq!(second.header.sequence, first.header.sequence + 1);
    }

    #[test]
    fn enqueued_move_command_applies_on_the_next_tick() {
        let hub = hub();
        let ack = hub.join(0);
        hub.enqueue_command(Command {
            origin_tick: Tick(1),
            actor_id: ack.actor_id,
            issued_at_ms: 0,
            payload: CommandPayload::Move {
                delta: Vec2::new(5.0, 0.0),
                facing: Facing::Right,
            },
        })
        .unwrap();

        let envelope = hub.run_tick(Tick(1), 0);
        assert!(envelope
            .patches
            .iter()
            .any(|p| p.entity_id == EntityId::Actor(ack.actor_id) && matches!(p.kind, PatchKind::Position(_))));
    }

    #[test]
    fn empty_world_produces_no_ground_item_patches() {
        let hub = hub();
        // No ground item was ever inserted, so the alive-set filter has
        // nothing to keep a ground-item patch alive against.
        let envelope = hub.run_tick(Tick(1), 0);
        assert!(!envelope.patches.iter().any(|p| matches!(p.entity_id, EntityId::GroundItem(_))));
    }

    #[test]
    fn translate_inbound_maps_every_message_kind_but_request_keyframe() {
        let actor = ActorId(1);
        let tick = Tick(5);
        let heartbeat = InboundMessage::Heartbeat { sent_at: 10 };
        let command = Hub::translate_inbound(actor, &heartbeat, tick, 1_000).unwrap();
        assert_eq!(command.origin_tick, tick);
        assert!(matches!(command.payload, CommandPayload::Heartbeat { sent_at_ms: 10 }));

        assert!(Hub::translate_inbound(actor, &InboundMessage::RequestKeyframe { sequence: 1 }, tick, 0).is_none());
    }

    #[tokio::test]
    async fn broadcast_to_no_subscribers_is_a_no_op() {
        let hub = hub();
        hub.join(0);
        let envelope = hub.run_tick(Tick(1), 0);
        hub.broadcast(&envelope).await;
        assert!(hub.subscribers().is_empty());
    }

    fn spawn_event(instance_id: arena_effects::instance::EffectInstanceId, end_policy: EndPolicy) -> EffectEvent {
        EffectEvent::Spawn {
            instance_id,
            tick: Tick(1),
            sequence: 1,
            instance: arena_effects::EffectInstance {
                id: instance_id,
                type_id: "spark".into(),
                start_tick: Tick(1),
                delivery: arena_effects::instance::DeliveryState {
                    geometry: arena_effects::definition::Geometry::Circle { radius: 1.0 },
                    motion: arena_effects::instance::MotionState {
                        position: Vec2::new(3.0, 4.0),
                        ..Default::default()
                    },
                    attached_actor_id: None,
                    follow_mode: arena_effects::definition::FollowMode::None,
                },
                behavior: arena_effects::instance::BehaviorState::default(),
                params: HashMap::new(),
                owner_actor_id: ActorId(7),
                follow_actor_id: None,
                replication: arena_effects::definition::ReplicationSpec::default(),
                end_policy,
            },
        }
    }

    #[test]
    fn instant_spawn_is_lifted_into_a_trigger_but_stays_in_spawns() {
        use arena_effects::instance::EffectInstanceId;

        let instant = spawn_event(EffectInstanceId(1), EndPolicy::Instant);
        let sustained = spawn_event(EffectInstanceId(2), EndPolicy::Duration);
        let spawns = vec![instant, sustained];

        let triggers = Hub::derive_effect_triggers(&spawns);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].instance_id, EffectInstanceId(1));
        assert_eq!(triggers[0].type_id, "spark");
        assert_eq!(triggers[0].owner_actor_id, ActorId(7));
        assert_eq!(triggers[0].position, Vec2::new(3.0, 4.0));
        assert_eq!(spawns.len(), 2, "instant spawns are still reported to lifecycle-tracking clients");
    }
}
