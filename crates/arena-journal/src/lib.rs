//! The replication journal: the staging area for everything a broadcast
//! carries (spec.md §4.4). Bundles a patch buffer, a dual-eviction keyframe
//! ring, and an effect-event stage with its resync-hint heuristic behind a
//! single [`Journal`] handle, the way `arena-hub`'s tick loop owns it.

pub mod effects;
pub mod keyframe;
pub mod patches;

use std::collections::HashMap;

use arena_core::world::ActorId;
use arena_core::{Patch, Tick};
use arena_effects::instance::{BehaviorState, DeliveryState, EffectInstanceId};
use arena_effects::{EffectInstance, EndReason};
use tracing::debug;

pub use effects::{DropReason, EffectEvent, EffectEventBatch, EffectEventStage, ResyncHint, ResyncReason, ResyncReasonKind};
pub use keyframe::{Eviction, EvictionReason, Keyframe, KeyframeRing, KeyframeWindow, RecordOutcome};
pub use patches::PatchBuffer;

/// Owning handle for the three journal pieces the hub's tick loop drains
/// every broadcast.
#[derive(Debug)]
pub struct Journal {
    patches: PatchBuffer,
    keyframes: KeyframeRing,
    effect_events: EffectEventStage,
}

impl Journal {
    /// Creates an empty journal with the given keyframe ring caps.
    #[must_use]
    pub fn new(keyframe_capacity: usize, keyframe_max_age_ms: u64) -> Self {
        Self {
            patches: PatchBuffer::default(),
            keyframes: KeyframeRing::new(keyframe_capacity, keyframe_max_age_ms),
            effect_events: EffectEventStage::default(),
        }
    }

    /// Stages a patch for the next broadcast.
    pub fn append_patch(&mut self, patch: Patch) {
        self.patches.append(patch);
    }

    /// Returns and clears staged patches.
    pub fn drain_patches(&mut self) -> Vec<Patch> {
        self.patches.drain()
    }

    /// Returns a copy of staged patches without clearing.
    #[must_use]
    pub fn snapshot_patches(&self) -> Vec<Patch> {
        self.patches.snapshot()
    }

    /// Records a keyframe, evicting from the ring as needed.
    pub fn record_keyframe(&mut self, frame: Keyframe, now_ms: u64) -> RecordOutcome {
        let outcome = self.keyframes.record(frame, now_ms);
        for eviction in &outcome.evicted {
            debug!(sequence = eviction.sequence, tick = eviction.tick.0, reason = ?eviction.reason, "keyframe evicted");
        }
        outcome
    }

    /// O(size) lookup of a previously recorded keyframe by sequence.
    #[must_use]
    pub fn lookup_keyframe(&self, sequence: u64) -> Option<Keyframe> {
        self.keyframes.lookup_by_sequence(sequence)
    }

    /// The keyframe ring's current extent.
    #[must_use]
    pub fn keyframe_window(&self) -> KeyframeWindow {
        self.keyframes.window()
    }

    /// The sequence the next `record_effect_update`/`record_effect_end` call
    /// for `instance_id` must carry to be accepted.
    #[must_use]
    pub fn next_effect_sequence(&self, instance_id: EffectInstanceId) -> u64 {
        self.effect_events.next_sequence(instance_id)
    }

    /// Stages a spawn; always accepted, allocates sequence 1 for a fresh id.
    pub fn record_effect_spawn(&mut self, instance_id: EffectInstanceId, tick: Tick, instance: EffectInstance) -> u64 {
        self.effect_events.record_spawn(instance_id, tick, instance)
    }

    /// Stages an update, validating monotonicity and the recently-ended
    /// guard. On drop, logs and returns the reason.
    pub fn record_effect_update(
        &mut self,
        instance_id: EffectInstanceId,
        tick: Tick,
        sequence: u64,
        delivery: Option<DeliveryState>,
        behavior: Option<BehaviorState>,
        params: Option<HashMap<String, f32>>,
    ) -> Result<(), DropReason> {
        let result = self.effect_events.record_update(instance_id, tick, sequence, delivery, behavior, params);
        if let Err(reason) = result {
            debug!(instance_id = instance_id.0, ?reason, "effect update dropped");
        }
        result
    }

    /// Stages an end, validating monotonicity and the recently-ended guard;
    /// on success marks `instance_id` recently-ended until the next drain.
    pub fn record_effect_end(
        &mut self,
        instance_id: EffectInstanceId,
        tick: Tick,
        sequence: u64,
        reason: EndReason,
    ) -> Result<(), DropReason> {
        let result = self.effect_events.record_end(instance_id, tick, sequence, reason);
        if let Err(drop_reason) = result {
            debug!(instance_id = instance_id.0, reason = ?drop_reason, "effect end dropped");
        }
        result
    }

    /// Deep-copies the staged effect-event batch without clearing it.
    #[must_use]
    pub fn snapshot_effect_events(&self) -> EffectEventBatch {
        self.effect_events.snapshot()
    }

    /// Returns and clears the staged effect-event batch, its cursor map, and
    /// the recently-ended set.
    pub fn drain_effect_events(&mut self) -> EffectEventBatch {
        self.effect_events.drain()
    }

    /// Atomically consumes the pending resync hint, if any.
    pub fn consume_resync_hint(&mut self) -> Option<ResyncHint> {
        self.effect_events.consume_resync_hint()
    }
}

/// Filters `patches` against the alive-entity set, dropping any patch whose
/// entity is neither alive nor terminal (spec.md §4.5 step 7).
#[must_use]
pub fn filter_against_alive_set(
    patches: Vec<Patch>,
    alive_actors: &std::collections::HashSet<ActorId>,
    alive_ground_items: &std::collections::HashSet<arena_core::world::GroundItemId>,
    alive_effects: &std::collections::HashSet<EffectInstanceId>,
) -> Vec<Patch> {
    patches
        .into_iter()
        .filter(|patch| {
            if patch.is_terminal() {
                return true;
            }
            match patch.entity_id {
                arena_core::EntityId::Actor(id) => alive_actors.contains(&id),
                arena_core::EntityId::GroundItem(id) => alive_ground_items.contains(&id),
                arena_core::EntityId::Effect(id) => alive_effects.contains(&EffectInstanceId(id)),
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use arena_core::{EntityId, PatchKind, Vec2};
    use std::collections::HashSet;

    #[test]
    fn alive_set_filter_keeps_live_and_terminal_patches() {
        let live_player = Patch::new(EntityId::Actor(ActorId(1)), PatchKind::Position(Vec2::ZERO));
        let phantom_npc = Patch::new(EntityId::Actor(ActorId(99)), PatchKind::Health { health: 1.0, max_health: 1.0 });
        let live_facing = Patch::new(EntityId::Actor(ActorId(1)), PatchKind::Facing(arena_core::Facing::Up));

        let alive_actors: HashSet<ActorId> = [ActorId(1)].into_iter().collect();
        let filtered = filter_against_alive_set(
            vec![live_player.clone(), phantom_npc, live_facing.clone()],
            &alive_actors,
            &HashSet::new(),
            &HashSet::new(),
        );

        assert_eq!(filtered, vec![live_player, live_facing]);
    }

    #[test]
    fn player_removed_patch_survives_filter_for_a_dead_actor() {
        let removed = Patch::new(EntityId::Actor(ActorId(1)), PatchKind::PlayerRemoved);
        let filtered = filter_against_alive_set(vec![removed.clone()], &HashSet::new(), &HashSet::new(), &HashSet::new());
        assert_eq!(filtered, vec![removed]);
    }
}
