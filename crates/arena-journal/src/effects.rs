//! Effect-event staging: the journal-owned sequencing and guard layer over
//! the raw lifecycle stream [`arena_effects::EffectManager::run_tick`]
//! produces (spec.md §4.4 "Effect events").

use std::collections::HashMap;

use arena_core::Tick;
use arena_effects::instance::{BehaviorState, DeliveryState, EffectInstance, EffectInstanceId};
use arena_effects::EndReason;

/// A staged effect lifecycle event, tagged with the journal-assigned
/// per-instance sequence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EffectEvent {
    /// The instance was created this tick.
    Spawn {
        /// Instance identity.
        instance_id: EffectInstanceId,
        /// Tick the instance spawned on.
        tick: Tick,
        /// Assigned sequence (always 1 for a fresh instance id).
        sequence: u64,
        /// A full copy of the instance as spawned.
        instance: EffectInstance,
    },
    /// The instance changed this tick.
    Update {
        /// Instance identity.
        instance_id: EffectInstanceId,
        /// Tick this update was produced on.
        tick: Tick,
        /// Assigned sequence.
        sequence: u64,
        /// Updated delivery state, when the replication whitelist allows it.
        delivery: Option<DeliveryState>,
        /// Updated behavior state, when the replication whitelist allows it.
        behavior: Option<BehaviorState>,
        /// Updated parameters, when the replication whitelist allows it.
        params: Option<HashMap<String, f32>>,
    },
    /// The instance's lifecycle ended this tick.
    End {
        /// Instance identity.
        instance_id: EffectInstanceId,
        /// Tick the instance ended on.
        tick: Tick,
        /// Assigned sequence.
        sequence: u64,
        /// Why it ended.
        reason: EndReason,
    },
}

/// A staged batch, as returned by [`EffectEventStage::snapshot`] /
/// [`EffectEventStage::drain`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EffectEventBatch {
    /// Spawn events staged this cycle.
    pub spawns: Vec<EffectEvent>,
    /// Update events staged this cycle.
    pub updates: Vec<EffectEvent>,
    /// End events staged this cycle.
    pub ends: Vec<EffectEvent>,
    /// Last sequence assigned per instance id, as of this batch.
    pub cursors: HashMap<EffectInstanceId, u64>,
}

/// Why a `record_*` call refused to stage an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DropReason {
    /// No spawn has ever been recorded for this id (or its memory was
    /// already released by a drain).
    UnknownId,
    /// The supplied sequence did not strictly exceed the last recorded one.
    NonMonotonic,
    /// The id is in the recently-ended set; drain releases this memory
    /// (spec.md §9 open question).
    UpdateAfterEnd,
}

/// Category an event drop is recorded under for the resync heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResyncReasonKind {
    /// An update/end arrived for an id with no recorded spawn.
    UnknownIdUpdate,
    /// An update/end arrived for an id already marked ended.
    UpdateAfterEnd,
}

/// One reason record backing a pending resync hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResyncReason {
    /// Category of loss.
    pub kind: ResyncReasonKind,
    /// The affected instance.
    pub effect_id: EffectInstanceId,
}

/// A consumed resync signal (spec.md §4.4 "Resync hint").
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResyncHint {
    /// Total lost-spawn-category drops observed since the last drain.
    pub lost_spawns: u64,
    /// Reason records, bounded to 8.
    pub reasons: Vec<ResyncReason>,
}

/// Resync hints carry at most this many reason records.
const MAX_RESYNC_REASONS: usize = 8;
/// `lost_spawns ≥ threshold × total_events / 10_000` raises a hint.
const RESYNC_THRESHOLD: u64 = 1;

/// Stages effect lifecycle events, assigns per-instance sequences, enforces
/// monotonicity, and tracks the resync-hint heuristic.
#[derive(Debug, Default)]
pub struct EffectEventStage {
    spawns: Vec<EffectEvent>,
    updates: Vec<EffectEvent>,
    ends: Vec<EffectEvent>,
    last_sequence: HashMap<EffectInstanceId, u64>,
    recently_ended: std::collections::HashSet<EffectInstanceId>,
    lost_spawns: u64,
    total_events: u64,
    resync_pending: bool,
    resync_reasons: Vec<ResyncReason>,
}

impl EffectEventStage {
    /// The sequence a `record_update`/`record_end` call for `id` must carry
    /// to be accepted right now (i.e. one past the last recorded value, or
    /// 1 if `id` is unknown / was just released by a drain).
    #[must_use]
    pub fn next_sequence(&self, instance_id: EffectInstanceId) -> u64 {
        self.last_sequence.get(&instance_id).copied().unwrap_or(0) + 1
    }

    fn note_lost_spawn(&mut self, kind: ResyncReasonKind, instance_id: EffectInstanceId) {
        self.lost_spawns += 1;
        if self.resync_reasons.len() < MAX_RESYNC_REASONS {
            self.resync_reasons.push(ResyncReason { kind, effect_id: instance_id });
        }
        if self.lost_spawns * 10_000 >= RESYNC_THRESHOLD * self.total_events {
            self.resync_pending = true;
        }
    }

    /// Stages a spawn, allocating sequence 1 for a fresh (or freshly
    /// released) instance id.
    pub fn record_spawn(&mut self, instance_id: EffectInstanceId, tick: Tick, instance: EffectInstance) -> u64 {
        let sequence = self.next_sequence(instance_id);
        self.last_sequence.insert(instance_id, sequence);
        self.recently_ended.remove(&instance_id);
        self.total_events += 1;
        self.spawns.push(EffectEvent::Spawn { instance_id, tick, sequence, instance });
        sequence
    }

    /// Stages an update carrying an explicit `sequence`, validating
    /// monotonicity and the recently-ended guard.
    pub fn record_update(
        &mut self,
        instance_id: EffectInstanceId,
        tick: Tick,
        sequence: u64,
        delivery: Option<DeliveryState>,
        behavior: Option<BehaviorState>,
        params: Option<HashMap<String, f32>>,
    ) -> Result<(), DropReason> {
        self.total_events += 1;
        if !self.last_sequence.contains_key(&instance_id) {
            self.note_lost_spawn(ResyncReasonKind::UnknownIdUpdate, instance_id);
            return Err(DropReason::UnknownId);
        }
        if sequence <= *self.last_sequence.get(&instance_id).unwrap_or(&0) {
            return Err(DropReason::NonMonotonic);
        }
        if self.recently_ended.contains(&instance_id) {
            self.note_lost_spawn(ResyncReasonKind::UpdateAfterEnd, instance_id);
            return Err(DropReason::UpdateAfterEnd);
        }
        self.last_sequence.insert(instance_id, sequence);
        self.updates.push(EffectEvent::Update { instance_id, tick, sequence, delivery, behavior, params });
        Ok(())
    }

    /// Stages an end carrying an explicit `sequence`, and marks `instance_id`
    /// recently-ended until the next drain.
    pub fn record_end(
        &mut self,
        instance_id: EffectInstanceId,
        tick: Tick,
        sequence: u64,
        reason: EndReason,
    ) -> Result<(), DropReason> {
        self.total_events += 1;
        if !self.last_sequence.contains_key(&instance_id) {
            self.note_lost_spawn(ResyncReasonKind::UnknownIdUpdate, instance_id);
            return Err(DropReason::UnknownId);
        }
        if sequence <= *self.last_sequence.get(&instance_id).unwrap_or(&0) {
            return Err(DropReason::NonMonotonic);
        }
        if self.recently_ended.contains(&instance_id) {
            self.note_lost_spawn(ResyncReasonKind::UpdateAfterEnd, instance_id);
            return Err(DropReason::UpdateAfterEnd);
        }
        self.last_sequence.insert(instance_id, sequence);
        self.recently_ended.insert(instance_id);
        self.ends.push(EffectEvent::End { instance_id, tick, sequence, reason });
        Ok(())
    }

    /// Deep-copies the currently staged batch without clearing it.
    #[must_use]
    pub fn snapshot(&self) -> EffectEventBatch {
        EffectEventBatch {
            spawns: self.spawns.clone(),
            updates: self.updates.clone(),
            ends: self.ends.clone(),
            cursors: self.last_sequence.clone(),
        }
    }

    /// Returns and clears the staged batch, the last-sequence cursor map,
    /// and the recently-ended set: the single point at which post-end
    /// memory is released, so a fresh spawn of a reused id restarts
    /// sequencing at 1 (spec.md §9 open question).
    pub fn drain(&mut self) -> EffectEventBatch {
        let batch = EffectEventBatch {
            spawns: std::mem::take(&mut self.spawns),
            updates: std::mem::take(&mut self.updates),
            ends: std::mem::take(&mut self.ends),
            cursors: std::mem::take(&mut self.last_sequence),
        };
        self.recently_ended.clear();
        batch
    }

    /// Atomically consumes the pending resync hint, if any.
    pub fn consume_resync_hint(&mut self) -> Option<ResyncHint> {
        if !self.resync_pending {
            return None;
        }
        self.resync_pending = false;
        Some(ResyncHint {
            lost_spawns: self.lost_spawns,
            reasons: std::mem::take(&mut self.resync_reasons),
        })
    }

    /// Telemetry-facing counters: `(unknown_id, non_monotonic, update_after_end)`
    /// are tracked by the caller from this stage's `Result`s; this exposes
    /// only the raw lost-spawn total for diagnostics.
    #[must_use]
    pub fn lost_spawns(&self) -> u64 {
        self.lost_spawns
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use arena_core::world::ActorId;
    use arena_core::Vec2;
    use arena_effects::definition::{EndPolicy, FollowMode, Geometry, ReplicationSpec};
    use arena_effects::instance::MotionState;
    use std::collections::HashMap as Map;

    fn stub_instance(id: EffectInstanceId) -> EffectInstance {
        EffectInstance {
            id,
            type_id: "area-burst".into(),
            start_tick: Tick(1),
            delivery: DeliveryState {
                geometry: Geometry::Circle { radius: 10.0 },
                motion: MotionState::default(),
                attached_actor_id: None,
                follow_mode: FollowMode::None,
            },
            behavior: BehaviorState::default(),
            params: Map::new(),
            owner_actor_id: ActorId(1),
            follow_actor_id: None,
            replication: ReplicationSpec::default(),
            end_policy: EndPolicy::Duration,
        }
    }

    #[test]
    fn spawn_then_updates_then_end_sequence_from_one() {
        let mut stage = EffectEventStage::default();
        let id = EffectInstanceId(1);
        assert_eq!(stage.record_spawn(id, Tick(1), stub_instance(id)), 1);
        let seq = stage.next_sequence(id);
        assert_eq!(seq, 2);
        stage.record_update(id, Tick(1), seq, None, None, None).unwrap();
        let seq = stage.next_sequence(id);
        assert_eq!(seq, 3);
        stage.record_update(id, Tick(2), seq, None, None, None).unwrap();
        let seq = stage.next_sequence(id);
        assert_eq!(seq, 4);
        stage.record_end(id, Tick(2), seq, EndReason::Expired).unwrap();

        let snap = stage.snapshot();
        assert_eq!(snap.spawns.len(), 1);
        assert_eq!(snap.updates.len(), 2);
        assert_eq!(snap.ends.len(), 1);
    }

    #[test]
    fn non_monotonic_update_is_dropped_twice() {
        let mut stage = EffectEventStage::default();
        let id = EffectInstanceId(1);
        stage.record_spawn(id, Tick(1), stub_instance(id));
        stage.record_update(id, Tick(1), 2, None, None, None).unwrap();

        let err = stage.record_update(id, Tick(1), 2, None, None, None).unwrap_err();
        assert_eq!(err, DropReason::NonMonotonic);
        let err = stage.record_update(id, Tick(1), 1, None, None, None).unwrap_err();
        assert_eq!(err, DropReason::NonMonotonic);
    }

    #[test]
    fn unknown_id_update_raises_resync_hint() {
        let mut stage = EffectEventStage::default();
        let ghost = EffectInstanceId(99);
        let err = stage.record_update(ghost, Tick(1), 1, None, None, None).unwrap_err();
        assert_eq!(err, DropReason::UnknownId);

        let hint = stage.consume_resync_hint().expect("hint should be pending");
        assert_eq!(hint.lost_spawns, 1);
        assert_eq!(hint.reasons.len(), 1);
        assert_eq!(hint.reasons[0].kind, ResyncReasonKind::UnknownIdUpdate);
        assert_eq!(hint.reasons[0].effect_id, ghost);

        assert!(stage.consume_resync_hint().is_none());
    }

    #[test]
    fn drain_resets_sequencing_for_a_reused_id() {
        let mut stage = EffectEventStage::default();
        let id = EffectInstanceId(1);
        stage.record_spawn(id, Tick(1), stub_instance(id));
        stage.record_end(id, Tick(1), 2, EndReason::Expired).unwrap();

        stage.drain();

        assert_eq!(stage.record_spawn(id, Tick(2), stub_instance(id)), 1);
    }

    #[test]
    fn update_after_end_is_dropped_until_drain() {
        let mut stage = EffectEventStage::default();
        let id = EffectInstanceId(1);
        stage.record_spawn(id, Tick(1), stub_instance(id));
        stage.record_end(id, Tick(1), 2, EndReason::Expired).unwrap();

        let err = stage.record_update(id, Tick(1), 3, None, None, None).unwrap_err();
        assert_eq!(err, DropReason::UpdateAfterEnd);
    }
}
