//! Process-wide counters read by every subsystem.
//!
//! A single [`parking_lot::Mutex`] guards a plain counter struct. For the
//! handful of fields tracked here this is simpler than a bank of atomics and
//! just as race-free; `snapshot` returns a self-consistent owned copy.

use parking_lot::Mutex;

/// A point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Total bytes written across all broadcast envelopes.
    pub broadcast_bytes: u64,
    /// Total entity-patches written across all broadcasts.
    pub broadcast_entities: u64,
    /// Total ticks observed.
    pub ticks_observed: u64,
    /// Total ticks whose duration exceeded the configured budget.
    pub tick_overruns: u64,
    /// Number of times the overrun alarm has fired.
    pub overrun_alarms: u64,
    /// On-demand keyframe requests refused by the rate limiter.
    pub keyframe_rate_limited: u64,
    /// Current size of the keyframe ring.
    pub keyframe_window_size: u64,
    /// Oldest sequence currently retained in the keyframe ring.
    pub keyframe_window_oldest: u64,
    /// Newest sequence currently retained in the keyframe ring.
    pub keyframe_window_newest: u64,
    /// Journal drops: update referencing an id with no active spawn.
    pub journal_drop_unknown_id: u64,
    /// Journal drops: non-monotonic sequence.
    pub journal_drop_non_monotonic: u64,
    /// Journal drops: update/end after the instance already ended.
    pub journal_drop_update_after_end: u64,
    /// Effect intents spawned.
    pub effects_spawned: u64,
    /// Effect update events emitted.
    pub effects_updated: u64,
    /// Effect end events emitted.
    pub effects_ended: u64,
    /// Effect intents silently dropped (unknown definition).
    pub effects_dropped_unknown_definition: u64,
    /// Hook invocations that panicked and were caught.
    pub effects_hook_panics: u64,
    /// Resync hints raised.
    pub resync_hints_raised: u64,
}

/// Shared counter set.
#[derive(Debug, Default)]
pub struct Telemetry {
    inner: Mutex<TelemetrySnapshot>,
}

impl Telemetry {
    /// Builds a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a consistent, owned copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        *self.inner.lock()
    }

    /// Applies `f` to the counters under the lock.
    pub fn update(&self, f: impl FnOnce(&mut TelemetrySnapshot)) {
        f(&mut self.inner.lock());
    }

    /// Adds `n` broadcast bytes/entities in one locked update.
    pub fn record_broadcast(&self, bytes: u64, entities: u64) {
        self.update(|t| {
            t.broadcast_bytes += bytes;
            t.broadcast_entities += entities;
        });
    }

    /// Records a tick observation, optionally an overrun.
    pub fn record_tick(&self, overran: bool) {
        self.update(|t| {
            t.ticks_observed += 1;
            if overran {
                t.tick_overruns += 1;
            }
        });
    }

    /// Records the keyframe ring's current window.
    pub fn record_keyframe_window(&self, size: u64, oldest: u64, newest: u64) {
        self.update(|t| {
            t.keyframe_window_size = size;
            t.keyframe_window_oldest = oldest;
            t.keyframe_window_newest = newest;
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_updates() {
        let telemetry = Telemetry::new();
        telemetry.record_broadcast(128, 4);
        telemetry.record_tick(true);
        let snap = telemetry.snapshot();
        assert_eq!(snap.broadcast_bytes, 128);
        assert_eq!(snap.broadcast_entities, 4);
        assert_eq!(snap.ticks_observed, 1);
        assert_eq!(snap.tick_overruns, 1);
    }
}
