//! Mutex-protected command staging: the one piece of world-adjacent state
//! connection handlers are allowed to touch directly (spec.md §4.5
//! "Scheduling model" — "transport input is handled by any number of
//! concurrent connection handlers, each staging commands into a
//! mutex-protected pending queue; handlers never touch world state
//! directly").

use std::sync::atomic::{AtomicU64, Ordering};

use arena_core::Command;
use parking_lot::Mutex;
use tracing::warn;

use crate::config::COMMAND_QUEUE_WARN_STRIDE;

/// A disjoint mutex domain holding commands staged for the next tick.
///
/// Staging order is preserved: commands pushed while the tick thread is
/// mid-tick are drained in enqueue order on the following tick (spec.md §5
/// "Ordering guarantees").
#[derive(Default)]
pub struct CommandStage {
    pending: Mutex<Vec<Command>>,
    total_staged: AtomicU64,
}

impl CommandStage {
    /// Builds an empty stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one command. Every `COMMAND_QUEUE_WARN_STRIDE`th addition logs
    /// a structured warning with the current depth (spec.md §4.5 "Command
    /// enqueue" — no hard limit, backpressure is reserved but out of scope).
    pub fn push(&self, command: Command) {
        let mut pending = self.pending.lock();
        pending.push(command);
        let depth = pending.len();
        let total = self.total_staged.fetch_add(1, Ordering::Relaxed) + 1;
        if total % COMMAND_QUEUE_WARN_STRIDE as u64 == 0 {
            warn!(depth, total, "command queue has staged another warning stride of commands");
        }
    }

    /// Swaps out the pending slice under lock, returning whatever had
    /// accumulated since the last drain.
    pub fn drain(&self) -> Vec<Command> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Current pending depth, for diagnostics.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use arena_core::world::ActorId;
    use arena_core::{CommandPayload, Tick};

    fn heartbeat(actor: u64) -> Command {
        Command {
            origin_tick: Tick(1),
            actor_id: ActorId(actor),
            issued_at_ms: 0,
            payload: CommandPayload::Heartbeat { sent_at_ms: 0 },
        }
    }

    #[test]
    fn drain_returns_in_enqueue_order_and_clears() {
        let stage = CommandStage::new();
        stage.push(heartbeat(1));
        stage.push(heartbeat(2));
        stage.push(heartbeat(3));
        assert_eq!(stage.depth(), 3);

        let drained = stage.drain();
        assert_eq!(drained.iter().map(|c| c.actor_id.0).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(stage.depth(), 0);
    }

    #[test]
    fn warning_stride_does_not_panic_across_many_pushes() {
        let stage = CommandStage::new();
        for i in 0..600 {
            stage.push(heartbeat(i));
        }
        assert_eq!(stage.depth(), 600);
    }
}
