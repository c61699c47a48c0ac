//! Append-only patch buffer, drained once per broadcast (spec.md §4.4).

use arena_core::Patch;

/// Staging buffer for [`Patch`]es produced during a tick's world step.
#[derive(Debug, Default)]
pub struct PatchBuffer {
    patches: Vec<Patch>,
}

impl PatchBuffer {
    /// O(1) append.
    pub fn append(&mut self, patch: Patch) {
        self.patches.push(patch);
    }

    /// Returns and clears the buffered patches.
    pub fn drain(&mut self) -> Vec<Patch> {
        std::mem::take(&mut self.patches)
    }

    /// Returns a copy without clearing.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Patch> {
        self.patches.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use arena_core::world::ActorId;
    use arena_core::{EntityId, PatchKind, Vec2};

    fn patch(id: u64) -> Patch {
        Patch::new(EntityId::Actor(ActorId(id)), PatchKind::Position(Vec2::ZERO))
    }

    #[test]
    fn drain_clears_and_snapshot_does_not() {
        let mut buffer = PatchBuffer::default();
        buffer.append(patch(1));
        buffer.append(patch(2));

        assert_eq!(buffer.snapshot().len(), 2);
        assert_eq!(buffer.snapshot().len(), 2, "snapshot must not clear");

        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert!(buffer.drain().is_empty());
    }
}
