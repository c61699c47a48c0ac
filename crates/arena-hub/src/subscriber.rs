//! The subscriber registry: one entry per connected client's write channel
//! (spec.md §5 "Shared-resource policy" — "the subscriber registry has its
//! own mutex; the registry lock is never held while writing to a
//! connection").

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::mpsc;

use crate::ratelimit::TokenBucket;

/// Capacity of a subscriber's write channel. Sized to hold a small burst of
/// broadcasts if the connection handler is momentarily slow to drain.
const WRITE_CHANNEL_CAPACITY: usize = 8;

/// Keyframe rate-limiter settings (spec.md §4.6).
const KEYFRAME_BUCKET_CAPACITY: u32 = 3;
const KEYFRAME_BUCKET_REFILL_PER_SEC: f64 = 2.0;

/// Identifies one connected subscriber. Opaque to everything but the
/// transport that assigned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub u64);

/// One connection's outbound state: a bounded byte-frame channel plus the
/// bookkeeping the hub needs to rate-limit and diagnose it.
pub struct Subscriber {
    /// Stable identity.
    pub id: SubscriberId,
    sender: mpsc::Sender<Vec<u8>>,
    keyframe_bucket: SyncMutex<TokenBucket>,
    last_ack: AtomicU64,
}

impl Subscriber {
    /// Attempts to consume one keyframe-request token.
    pub fn try_take_keyframe_token(&self, now_ms: u64) -> bool {
        self.keyframe_bucket.lock().try_take(now_ms)
    }

    /// Records the last broadcast sequence this subscriber has acknowledged.
    pub fn record_ack(&self, sequence: u64) {
        self.last_ack.store(sequence, Ordering::Relaxed);
    }

    /// The last acknowledged sequence, for diagnostics.
    #[must_use]
    pub fn last_ack(&self) -> u64 {
        self.last_ack.load(Ordering::Relaxed)
    }

    /// The sender half a connection handler never sees directly; broadcast
    /// assembly clones this out of the registry snapshot to write without
    /// holding the registry lock.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.sender.clone()
    }
}

/// Registry of live subscribers, keyed by [`SubscriberId`].
#[derive(Default)]
pub struct SubscriberRegistry {
    inner: SyncMutex<HashMap<SubscriberId, Arc<Subscriber>>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber, returning its id, a handle, and the
    /// receiving half the connection handler drains and writes to the
    /// transport.
    #[must_use]
    pub fn register(&self, now_ms: u64) -> (Arc<Subscriber>, mpsc::Receiver<Vec<u8>>) {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (sender, receiver) = mpsc::channel(WRITE_CHANNEL_CAPACITY);
        let subscriber = Arc::new(Subscriber {
            id,
            sender,
            keyframe_bucket: SyncMutex::new(TokenBucket::new(
                KEYFRAME_BUCKET_CAPACITY,
                KEYFRAME_BUCKET_REFILL_PER_SEC,
                now_ms,
            )),
            last_ack: AtomicU64::new(0),
        });
        self.inner.lock().insert(id, subscriber.clone());
        (subscriber, receiver)
    }

    /// Removes a subscriber, e.g. after a write timeout or closed channel.
    pub fn remove(&self, id: SubscriberId) {
        self.inner.lock().remove(&id);
    }

    /// A point-in-time snapshot of every live subscriber, for broadcast
    /// fan-out. Taken and released immediately; writes happen after the
    /// lock is dropped.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.inner.lock().values().cloned().collect()
    }

    /// Current subscriber count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True if no subscribers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn register_then_remove_empties_the_snapshot() {
        let registry = SubscriberRegistry::new();
        let (subscriber, _receiver) = registry.register(0);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot().len(), 1);

        registry.remove(subscriber.id);
        assert!(registry.is_empty());
    }

    #[test]
    fn ack_tracking_round_trips() {
        let registry = SubscriberRegistry::new();
        let (subscriber, _receiver) = registry.register(0);
        subscriber.record_ack(42);
        assert_eq!(subscriber.last_ack(), 42);
    }

    #[tokio::test]
    async fn registered_subscriber_receives_written_frames() {
        let registry = SubscriberRegistry::new();
        let (subscriber, mut receiver) = registry.register(0);
        subscriber.sender().send(vec![1, 2, 3]).await.unwrap();
        assert_eq!(receiver.recv().await, Some(vec![1, 2, 3]));
    }
}
