//! On-demand keyframe requests, outside the normal broadcast cadence
//! (spec.md §4.6).

use arena_core::telemetry::Telemetry;
use arena_journal::{Journal, Keyframe};

use crate::subscriber::Subscriber;

/// Why a keyframe request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
    /// The subscriber's token bucket had no tokens available.
    RateLimited,
    /// The sequence once existed but has since been evicted from the ring.
    Expired,
}

/// The outcome of [`handle_keyframe_request`].
#[derive(Debug, Clone, PartialEq)]
pub enum KeyframeResponse {
    /// The requested keyframe, as a deep copy.
    Found(Keyframe),
    /// The request was refused.
    Nack(NackReason),
    /// The sequence has not (yet) been produced, or was `0`.
    NotFound,
}

/// Services one on-demand keyframe request (spec.md §4.6
/// `handle-keyframe-request`).
#[must_use]
pub fn handle_keyframe_request(
    subscriber: &Subscriber,
    sequence: u64,
    now_ms: u64,
    journal: &Journal,
    telemetry: &Telemetry,
) -> KeyframeResponse {
    if !subscriber.try_take_keyframe_token(now_ms) {
        telemetry.update(|t| t.keyframe_rate_limited += 1);
        return KeyframeResponse::Nack(NackReason::RateLimited);
    }

    if sequence == 0 {
        return KeyframeResponse::NotFound;
    }

    if let Some(frame) = journal.lookup_keyframe(sequence) {
        return KeyframeResponse::Found(frame);
    }

    // By this point `sequence` was not found in the ring. Any sequence at or
    // below the newest currently held must have been produced already
    // (sequences are monotonic), so it was evicted rather than never made.
    let window = journal.keyframe_window();
    let was_evicted = match window.newest_sequence {
        Some(newest) => sequence <= newest,
        None => false,
    };
    if was_evicted {
        KeyframeResponse::Nack(NackReason::Expired)
    } else {
        KeyframeResponse::NotFound
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use arena_core::world::WorldConfig;
    use arena_core::Tick;
    use arena_journal::keyframe::Keyframe as RawKeyframe;

    fn empty_keyframe(sequence: u64, recorded_at_ms: u64) -> RawKeyframe {
        RawKeyframe {
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

    fn subscriber() -> std::sync::Arc<Subscriber> {
        crate::subscriber::SubscriberRegistry::new().register(0).0
    }

    #[test]
    fn zero_sequence_is_not_found() {
        let journal = Journal::new(4, 0);
        let telemetry = Telemetry::new();
        let response = handle_keyframe_request(&subscriber(), 0, 0, &journal, &telemetry);
        assert_eq!(response, KeyframeResponse::NotFound);
    }

    #[test]
    fn live_sequence_is_found() {
        let mut journal = Journal::new(4, 0);
        journal.record_keyframe(empty_keyframe(1, 0), 0);
        let telemetry = Telemetry::new();
        let response = handle_keyframe_request(&subscriber(), 1, 0, &journal, &telemetry);
        assert_eq!(response, KeyframeResponse::Found(empty_keyframe(1, 0)));
    }

    #[test]
    fn evicted_sequence_is_nacked_as_expired() {
        let mut journal = Journal::new(1, 0);
        journal.record_keyframe(empty_keyframe(1, 0), 0);
        journal.record_keyframe(empty_keyframe(2, 0), 0);
        let telemetry = Telemetry::new();
        let response = handle_keyframe_request(&subscriber(), 1, 0, &journal, &telemetry);
        assert_eq!(response, KeyframeResponse::Nack(NackReason::Expired));
    }

    #[test]
    fn sequence_above_newest_is_not_yet_produced() {
        let mut journal = Journal::new(4, 0);
        journal.record_keyframe(empty_keyframe(1, 0), 0);
        let telemetry = Telemetry::new();
        let response = handle_keyframe_request(&subscriber(), 5, 0, &journal, &telemetry);
        assert_eq!(response, KeyframeResponse::NotFound);
    }

    #[test]
    fn fourth_request_within_a_second_is_rate_limited() {
        let journal = Journal::new(4, 0);
        let telemetry = Telemetry::new();
        let sub = subscriber();
        for _ in 0..3 {
            assert_ne!(
                handle_keyframe_request(&sub, 0, 0, &journal, &telemetry),
                KeyframeResponse::Nack(NackReason::RateLimited)
            );
        }
        assert_eq!(
            handle_keyframe_request(&sub, 0, 0, &journal, &telemetry),
            KeyframeResponse::Nack(NackReason::RateLimited)
        );
        assert_eq!(telemetry.snapshot().keyframe_rate_limited, 1);

        assert_eq!(
            handle_keyframe_request(&sub, 0, 1_500, &journal, &telemetry),
            KeyframeResponse::NotFound
        );
    }
}
