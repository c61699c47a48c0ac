//! The simulation tick: a non-negative, monotonically increasing step
//! counter shared by every subsystem.

/// One step of the fixed-rate simulation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    /// The first tick of a run.
    pub const ZERO: Self = Self(0);

    /// Returns `self + n`.
    #[must_use]
    pub fn advance(self, n: u64) -> Self {
        Self(self.0 + n)
    }

    /// Returns the next tick.
    #[must_use]
    pub fn next(self) -> Self {
        self.advance(1)
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
