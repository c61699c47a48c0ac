//! Dual-eviction keyframe ring: a bounded history of full world snapshots
//! (spec.md §4.4 "Keyframes").

use std::collections::VecDeque;

use arena_core::world::{GroundItem, Npc, Obstacle, Player, WorldConfig};
use arena_core::Tick;

/// A full replicable world snapshot, recorded at a specific tick/sequence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Keyframe {
    /// Tick this snapshot was taken on.
    pub tick: Tick,
    /// Broadcast sequence assigned to this keyframe.
    pub sequence: u64,
    /// Wall-clock time (ms) this frame was recorded, for age eviction.
    pub recorded_at_ms: u64,
    /// Players at the time of the snapshot.
    pub players: Vec<Player>,
    /// NPCs at the time of the snapshot.
    pub npcs: Vec<Npc>,
    /// Static obstacle layout.
    pub obstacles: Vec<Obstacle>,
    /// Ground items at the time of the snapshot.
    pub ground_items: Vec<GroundItem>,
    /// World tunables.
    pub world_config: WorldConfig,
}

/// Why a keyframe was evicted from the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EvictionReason {
    /// The ring exceeded its configured capacity.
    Count,
    /// The frame's age exceeded the configured max age.
    Expired,
}

/// Metadata about one evicted keyframe, for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Eviction {
    /// The evicted frame's sequence.
    pub sequence: u64,
    /// The evicted frame's tick.
    pub tick: Tick,
    /// Why it was evicted.
    pub reason: EvictionReason,
}

/// The result of [`KeyframeRing::record`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordOutcome {
    /// Ring size after recording and evicting.
    pub size: usize,
    /// Oldest sequence still held, if any.
    pub oldest_sequence: Option<u64>,
    /// Newest sequence (the one just recorded).
    pub newest_sequence: u64,
    /// Frames evicted by this call, oldest first.
    pub evicted: Vec<Eviction>,
}

/// A snapshot of the ring's current extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyframeWindow {
    /// Ring size.
    pub size: usize,
    /// Oldest sequence still held, if any.
    pub oldest_sequence: Option<u64>,
    /// Newest sequence still held, if any.
    pub newest_sequence: Option<u64>,
}

/// A bounded ring of [`Keyframe`]s with both a count cap and a max-age cap.
/// `capacity == 0` disables the count cap; `max_age_ms == 0` disables the
/// age cap (spec.md §4.4 "Contract").
#[derive(Debug)]
pub struct KeyframeRing {
    capacity: usize,
    max_age_ms: u64,
    frames: VecDeque<Keyframe>,
}

impl KeyframeRing {
    /// Creates an empty ring with the given caps.
    #[must_use]
    pub fn new(capacity: usize, max_age_ms: u64) -> Self {
        Self {
            capacity,
            max_age_ms,
            frames: VecDeque::new(),
        }
    }

    /// Appends `frame`, then evicts from the head while the ring is over
    /// capacity or the head has aged past `max_age_ms` (both evaluated
    /// against `now_ms`, the time of this call).
    pub fn record(&mut self, frame: Keyframe, now_ms: u64) -> RecordOutcome {
        let newest_sequence = frame.sequence;
        self.frames.push_back(frame);

        let mut evicted = Vec::new();
        loop {
            let over_capacity = self.capacity > 0 && self.frames.len() > self.capacity;
            let expired = self.max_age_ms > 0
                && self
                    .frames
                    .front()
                    .is_some_and(|f| now_ms.saturating_sub(f.recorded_at_ms) > self.max_age_ms);

            if !over_capacity && !expired {
                break;
            }
            // Count eviction takes priority when both conditions hold for
            // the same head frame; either way the head is the victim.
            let reason = if over_capacity {
                EvictionReason::Count
            } else {
                EvictionReason::Expired
            };
            let Some(head) = self.frames.pop_front() else { break };
            evicted.push(Eviction {
                sequence: head.sequence,
                tick: head.tick,
                reason,
            });
        }

        RecordOutcome {
            size: self.frames.len(),
            oldest_sequence: self.frames.front().map(|f| f.sequence),
            newest_sequence,
            evicted,
        }
    }

    /// O(size) scan for a frame by its assigned sequence. Returns a deep
    /// copy (spec.md §8 "Keyframe round-trip").
    #[must_use]
    pub fn lookup_by_sequence(&self, sequence: u64) -> Option<Keyframe> {
        self.frames.iter().find(|f| f.sequence == sequence).cloned()
    }

    /// The ring's current extent.
    #[must_use]
    pub fn window(&self) -> KeyframeWindow {
        KeyframeWindow {
            size: self.frames.len(),
            oldest_sequence: self.frames.front().map(|f| f.sequence),
            newest_sequence: self.frames.back().map(|f| f.sequence),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn frame(sequence: u64, recorded_at_ms: u64) -> Keyframe {
        Keyframe {
            tick: Tick(sequence),
            sequence,
            recorded_at_ms,
            players: Vec::new(),
            npcs: Vec::new(),
            obstacles: Vec::new(),
            ground_items: Vec::new(),
            world_config: WorldConfig::default(),
        }
    }

    #[test]
    fn evicts_oldest_first_on_count() {
        let mut ring = KeyframeRing::new(2, 0);
        ring.record(frame(1, 0), 0);
        ring.record(frame(2, 0), 0);
        let outcome = ring.record(frame(3, 0), 0);

        assert_eq!(outcome.size, 2);
        assert_eq!(outcome.evicted.len(), 1);
        assert_eq!(outcome.evicted[0].sequence, 1);
        assert_eq!(outcome.evicted[0].reason, EvictionReason::Count);
        assert_eq!(ring.window().oldest_sequence, Some(2));
    }

    #[test]
    fn evicts_by_age() {
        let mut ring = KeyframeRing::new(4, 5);
        ring.record(frame(1, 0), 0);
        let outcome = ring.record(frame(2, 10), 10);

        assert_eq!(outcome.size, 1);
        assert_eq!(outcome.oldest_sequence, Some(2));
        assert_eq!(outcome.newest_sequence, 2);
        assert_eq!(outcome.evicted, vec![Eviction { sequence: 1, tick: Tick(1), reason: EvictionReason::Expired }]);
    }

    #[test]
    fn zero_capacity_disables_count_eviction() {
        let mut ring = KeyframeRing::new(0, 0);
        for i in 1..=10 {
            ring.record(frame(i, 0), 0);
        }
        assert_eq!(ring.window().size, 10);
    }

    #[test]
    fn round_trip_lookup_returns_deep_copy() {
        let mut ring = KeyframeRing::new(4, 0);
        ring.record(frame(7, 0), 0);
        let found = ring.lookup_by_sequence(7).unwrap();
        assert_eq!(found.sequence, 7);
        assert!(ring.lookup_by_sequence(99).is_none());
    }
}
