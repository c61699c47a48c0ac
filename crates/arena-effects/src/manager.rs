//! The per-tick effect manager: spawns intents, advances live instances,
//! resolves end policies, and stages lifecycle events for the journal.

use std::collections::HashMap;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use arena_core::world::ActorId;
use arena_core::Tick;

use crate::definition::{EffectDefinition, EndCondition, EndPolicy, FollowMode};
use crate::events::{EndReason, LifecycleEvent};
use crate::hooks::{EffectHost, HookRegistry};
use crate::instance::{DeliveryState, EffectInstance, EffectInstanceId, MotionState};
use crate::intent::EffectIntent;

/// Owns every live effect instance and the hooks that drive them.
///
/// Instance ids are allocated in spawn order and instances are stored in a
/// `BTreeMap` so a tick always advances them in ascending-id order; an
/// instance spawned this tick is advanced in the same tick, which is what
/// lets an `instant` end policy end on its spawn tick.
pub struct EffectManager {
    hooks: HookRegistry,
    definitions: FxHashMap<String, EffectDefinition>,
    instances: std::collections::BTreeMap<EffectInstanceId, EffectInstance>,
    pending_intents: Vec<EffectIntent>,
    next_instance_id: u64,
}

impl EffectManager {
    /// Builds a manager from a definition table and hook registry.
    #[must_use]
    pub fn new(definitions: Vec<EffectDefinition>, hooks: HookRegistry) -> Self {
        let definitions = definitions.into_iter().map(|d| (d.type_id.clone(), d)).collect();
        Self {
            hooks,
            definitions,
            instances: std::collections::BTreeMap::new(),
            pending_intents: Vec::new(),
            next_instance_id: 1,
        }
    }

    /// Queues an intent to be spawned on the next [`Self::run_tick`].
    pub fn enqueue_intent(&mut self, intent: EffectIntent) {
        self.pending_intents.push(intent);
    }

    /// Intents queued since the last [`Self::run_tick`] drain.
    #[must_use]
    pub fn pending_intents(&self) -> &[EffectIntent] {
        &self.pending_intents
    }

    /// Clears any queued intents without spawning them.
    pub fn reset_pending_intents(&mut self) {
        self.pending_intents.clear();
    }

    /// All currently live instances, keyed by id.
    #[must_use]
    pub fn instances(&self) -> &std::collections::BTreeMap<EffectInstanceId, EffectInstance> {
        &self.instances
    }

    /// The loaded definition for `type_id`, if any. Lets a caller building an
    /// [`EffectIntent`] fill in `delivery_kind` correctly instead of
    /// guessing it.
    #[must_use]
    pub fn definition(&self, type_id: &str) -> Option<&EffectDefinition> {
        self.definitions.get(type_id)
    }

    /// Runs one tick: drains and spawns queued intents, then advances every
    /// live instance (including ones spawned this tick) in ascending id
    /// order, emitting lifecycle events via `emit`.
    ///
    /// `host` resolves the world queries hooks and end-condition checks need.
    /// Sequencing of emitted events is the journal's responsibility; this
    /// only orders emission by ascending instance id within the tick.
    #[allow(clippy::too_many_arguments)]
    pub fn run_tick(
        &mut self,
        host: &mut dyn EffectHost,
        tick: Tick,
        now_ms: u64,
        telemetry: &arena_core::telemetry::Telemetry,
        mut emit: impl FnMut(LifecycleEvent),
    ) {
        let intents = std::mem::take(&mut self.pending_intents);
        for intent in intents {
            self.spawn_from_intent(&intent, host, tick, now_ms, telemetry, &mut emit);
        }

        let ids: Vec<EffectInstanceId> = self.instances.keys().copied().collect();
        for id in ids {
            self.advance_instance(id, host, tick, now_ms, telemetry, &mut emit);
        }
    }

    fn spawn_from_intent(
        &mut self,
        intent: &EffectIntent,
        host: &mut dyn EffectHost,
        tick: Tick,
        now_ms: u64,
        telemetry: &arena_core::telemetry::Telemetry,
        emit: &mut impl FnMut(LifecycleEvent),
    ) {
        let Some(definition) = self.definitions.get(&intent.type_id) else {
            telemetry.update(|t| t.effects_dropped_unknown_definition += 1);
            warn!(type_id = %intent.type_id, entry_id = %intent.entry_id, "dropping intent: unknown effect definition");
            return;
        };

        let id = EffectInstanceId(self.next_instance_id);
        self.next_instance_id += 1;

        let geometry = intent.geometry_override.unwrap_or(definition.geometry);
        let follow_mode = match definition.motion_profile {
            crate::definition::MotionProfile::Follow => {
                if intent.target_actor_id.is_some() {
                    FollowMode::Target
                } else {
                    FollowMode::Owner
                }
            }
            _ => FollowMode::None,
        };
        let follow_actor_id = match follow_mode {
            FollowMode::Owner => Some(intent.source_actor_id),
            FollowMode::Target => intent.target_actor_id,
            FollowMode::None => None,
        };
        let position = follow_actor_id
            .and_then(|a| host.actor_position(a))
            .or_else(|| host.actor_position(intent.source_actor_id))
            .unwrap_or(arena_core::Vec2::ZERO);

        let mut params = definition.params.clone();
        params.extend(intent.params.clone());

        let ticks_remaining = intent
            .duration_ticks_override
            .unwrap_or(definition.lifetime_ticks);
        let tick_cadence = intent.tick_cadence_override.unwrap_or(0);

        let mut instance = EffectInstance {
            id,
            type_id: definition.type_id.clone(),
            start_tick: tick,
            delivery: DeliveryState {
                geometry,
                motion: MotionState {
                    position,
                    ..MotionState::default()
                },
                attached_actor_id: follow_actor_id,
                follow_mode,
            },
            behavior: crate::instance::BehaviorState {
                ticks_remaining,
                tick_cadence,
                ..crate::instance::BehaviorState::default()
            },
            params,
            owner_actor_id: intent.source_actor_id,
            follow_actor_id,
            replication: definition.replication.clone(),
            end_policy: definition.end_policy.clone(),
        };

        self.hooks
            .run_on_spawn(definition.hooks.on_spawn.as_deref(), host, &mut instance, tick, now_ms, telemetry);

        telemetry.update(|t| t.effects_spawned += 1);
        if instance.replication.send_spawn {
            emit(LifecycleEvent::Spawn {
                instance_id: id,
                tick,
                instance: instance.clone(),
            });
        }
        self.instances.insert(id, instance);
    }

    fn advance_instance(
        &mut self,
        id: EffectInstanceId,
        host: &mut dyn EffectHost,
        tick: Tick,
        now_ms: u64,
        telemetry: &arena_core::telemetry::Telemetry,
        emit: &mut impl FnMut(LifecycleEvent),
    ) {
        let Some(definition) = self
            .instances
            .get(&id)
            .and_then(|inst| self.definitions.get(&inst.type_id))
            .cloned()
        else {
            return;
        };

        if let Some(instance) = self.instances.get_mut(&id) {
            if instance.delivery.follow_mode != FollowMode::None {
                if let Some(actor) = instance.follow_actor_id {
                    if let Some(pos) = host.actor_position(actor) {
                        instance.delivery.motion.position = pos;
                    }
                }
            }

            let fires_on_tick = instance.behavior.tick_cadence == 0
                || tick.0.is_multiple_of(u64::from(instance.behavior.tick_cadence));
            if fires_on_tick {
                self.hooks
                    .run_on_tick(definition.hooks.on_tick.as_deref(), host, instance, tick, now_ms, telemetry);
            }

            if instance.behavior.ticks_remaining > 0 && matches!(definition.end_policy, EndPolicy::Duration) {
                instance.behavior.ticks_remaining -= 1;
            }

            if instance.replication.send_updates {
                emit(LifecycleEvent::Update {
                    instance_id: id,
                    tick,
                    delivery: Some(instance.delivery.clone()),
                    behavior: Some(instance.behavior.clone()),
                    params: Some(instance.params.clone()),
                });
                telemetry.update(|t| t.effects_updated += 1);
            }
        }

        if let Some(reason) = self.evaluate_end_policy(id, host, &definition) {
            self.end_instance(id, host, tick, now_ms, telemetry, reason, emit);
        }
    }

    fn evaluate_end_policy(&self, id: EffectInstanceId, host: &dyn EffectHost, definition: &EffectDefinition) -> Option<EndReason> {
        let instance = self.instances.get(&id)?;

        match &definition.end_policy {
            EndPolicy::Instant => Some(EndReason::Expired),
            EndPolicy::Duration => {
                if instance.behavior.ticks_remaining == 0 {
                    Some(EndReason::Expired)
                } else {
                    None
                }
            }
            // Only a `condition` end policy consults the host; an enabled
            // condition's predicate is the sole trigger (spec.md §4.3).
            EndPolicy::Condition(conditions) => conditions.iter().find_map(|c| match c {
                EndCondition::OnUnequip | EndCondition::OnExplicitCancel => {
                    host.cancel_requested(id).then_some(EndReason::Cancelled)
                }
                EndCondition::OnOwnerDeath | EndCondition::OnOwnerLost => {
                    (!host.actor_alive(instance.owner_actor_id)).then_some(EndReason::OwnerLost)
                }
                EndCondition::OnZoneChange => host.zone_changed(id).then_some(EndReason::MapChange),
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn end_instance(
        &mut self,
        id: EffectInstanceId,
        host: &mut dyn EffectHost,
        tick: Tick,
        now_ms: u64,
        telemetry: &arena_core::telemetry::Telemetry,
        reason: EndReason,
        emit: &mut impl FnMut(LifecycleEvent),
    ) {
        let Some(mut instance) = self.instances.remove(&id) else {
            return;
        };
        let hook_name = self
            .definitions
            .get(&instance.type_id)
            .and_then(|d| d.hooks.on_expire.clone());
        self.hooks.run_on_expire(hook_name.as_deref(), host, &mut instance, tick, now_ms, telemetry);

        telemetry.update(|t| t.effects_ended += 1);
        debug!(instance = id.0, type_id = %instance.type_id, ?reason, "effect instance ended");
        if instance.replication.send_end {
            emit(LifecycleEvent::End { instance_id: id, tick, reason });
        }
    }

    /// Resolves an impact against `actor_id` for a live instance, running its
    /// `on-hit` hook if one is registered. Callers are expected to have
    /// already confirmed the geometry overlap; the manager only runs the
    /// hook and accounts for it.
    pub fn resolve_hit(
        &mut self,
        id: EffectInstanceId,
        actor_id: ActorId,
        host: &mut dyn EffectHost,
        tick: Tick,
        now_ms: u64,
        telemetry: &arena_core::telemetry::Telemetry,
    ) {
        let Some(hook_name) = self
            .instances
            .get(&id)
            .and_then(|inst| self.definitions.get(&inst.type_id))
            .and_then(|d| d.hooks.on_hit.clone())
        else {
            return;
        };
        if let Some(instance) = self.instances.get_mut(&id) {
            self.hooks.run_on_hit(Some(&hook_name), host, instance, actor_id, tick, now_ms, telemetry);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::definition::{DeliveryKind, Geometry, HookNames, ImpactPolicy, MotionProfile, ReplicationSpec};
    use arena_core::Vec2;
    use std::collections::HashSet;

    struct StubHost {
        positions: HashMap<ActorId, Vec2>,
        dead: HashSet<ActorId>,
    }

    impl EffectHost for StubHost {
        fn actor_position(&self, actor_id: ActorId) -> Option<Vec2> {
            self.positions.get(&actor_id).copied()
        }
        fn actor_alive(&self, actor_id: ActorId) -> bool {
            !self.dead.contains(&actor_id)
        }
        fn cancel_requested(&self, _instance_id: EffectInstanceId) -> bool {
            false
        }
        fn zone_changed(&self, _instance_id: EffectInstanceId) -> bool {
            false
        }
    }

    fn area_burst_definition(lifetime_ticks: u32) -> EffectDefinition {
        EffectDefinition {
            type_id: "area-burst".to_string(),
            delivery_kind: DeliveryKind::Area,
            geometry: Geometry::Circle { radius: 4.0 },
            motion_profile: MotionProfile::None,
            impact_policy: ImpactPolicy::AllInPath,
            lifetime_ticks,
            pierce_count: 0,
            replication: ReplicationSpec {
                send_spawn: true,
                send_updates: true,
                send_end: true,
                managed_by_client: false,
                field_whitelist: None,
            },
            end_policy: EndPolicy::Duration,
            hooks: HookNames::default(),
            params: HashMap::new(),
        }
    }

    fn intent(type_id: &str, source: ActorId) -> EffectIntent {
        EffectIntent {
            entry_id: "test".to_string(),
            type_id: type_id.to_string(),
            delivery_kind: DeliveryKind::Area,
            source_actor_id: source,
            target_actor_id: None,
            geometry_override: None,
            duration_ticks_override: None,
            tick_cadence_override: None,
            params: HashMap::new(),
        }
    }

    #[test]
    fn area_burst_spawns_updates_twice_then_ends() {
        let telemetry = arena_core::telemetry::Telemetry::new();
        let mut host = StubHost {
            positions: HashMap::from([(ActorId(1), Vec2::ZERO)]),
            dead: HashSet::new(),
        };
        let mut manager = EffectManager::new(vec![area_burst_definition(2)], HookRegistry::new());
        manager.enqueue_intent(intent("area-burst", ActorId(1)));

        let mut events = Vec::new();
        manager.run_tick(&mut host, Tick(1), 1_000, &telemetry, |e| events.push(e));
        manager.run_tick(&mut host, Tick(2), 1_010, &telemetry, |e| events.push(e));
        manager.run_tick(&mut host, Tick(3), 1_020, &telemetry, |e| events.push(e));

        assert!(matches!(events[0], LifecycleEvent::Spawn { tick: Tick(1), .. }));
        let updates = events
            .iter()
            .filter(|e| matches!(e, LifecycleEvent::Update { .. }))
            .count();
        assert_eq!(updates, 2);
        let ends = events.iter().filter(|e| matches!(e, LifecycleEvent::End { .. })).count();
        assert_eq!(ends, 1);
        assert!(manager.instances().is_empty());
    }

    #[test]
    fn unknown_definition_is_dropped_and_counted() {
        let telemetry = arena_core::telemetry::Telemetry::new();
        let mut host = StubHost {
            positions: HashMap::new(),
            dead: HashSet::new(),
        };
        let mut manager = EffectManager::new(Vec::new(), HookRegistry::new());
        manager.enqueue_intent(intent("does-not-exist", ActorId(1)));
        manager.run_tick(&mut host, Tick(1), 0, &telemetry, |_| {});
        assert_eq!(telemetry.snapshot().effects_dropped_unknown_definition, 1);
        assert!(manager.instances().is_empty());
    }

    #[test]
    fn owner_death_ends_the_instance_immediately() {
        let telemetry = arena_core::telemetry::Telemetry::new();
        let mut host = StubHost {
            positions: HashMap::from([(ActorId(1), Vec2::ZERO)]),
            dead: HashSet::new(),
        };
        let mut definition = area_burst_definition(10);
        definition.end_policy = EndPolicy::Condition(vec![EndCondition::OnOwnerDeath]);
        let mut manager = EffectManager::new(vec![definition], HookRegistry::new());
        manager.enqueue_intent(intent("area-burst", ActorId(1)));
        let mut events = Vec::new();
        manager.run_tick(&mut host, Tick(1), 0, &telemetry, |e| events.push(e));

        host.dead.insert(ActorId(1));
        manager.run_tick(&mut host, Tick(2), 0, &telemetry, |e| events.push(e));

        assert!(events.iter().any(|e| matches!(e, LifecycleEvent::End { reason: EndReason::OwnerLost, .. })));
        assert!(manager.instances().is_empty());
    }

    #[test]
    fn duration_policy_ignores_owner_death() {
        let telemetry = arena_core::telemetry::Telemetry::new();
        let mut host = StubHost {
            positions: HashMap::from([(ActorId(1), Vec2::ZERO)]),
            dead: HashSet::new(),
        };
        let mut manager = EffectManager::new(vec![area_burst_definition(10)], HookRegistry::new());
        manager.enqueue_intent(intent("area-burst", ActorId(1)));
        let mut events = Vec::new();
        manager.run_tick(&mut host, Tick(1), 0, &telemetry, |e| events.push(e));

        host.dead.insert(ActorId(1));
        manager.run_tick(&mut host, Tick(2), 0, &telemetry, |e| events.push(e));

        assert!(!events.iter().any(|e| matches!(e, LifecycleEvent::End { .. })));
        assert!(!manager.instances().is_empty());
    }
}
