//! Errors raised while compiling or executing archetype AI.

use thiserror::Error;

/// Failures raised by [`crate::library::AiLibrary::compile`].
#[derive(Debug, Error)]
pub enum AiError {
    /// The authored YAML document could not be parsed.
    #[error("invalid archetype document: {0}")]
    InvalidDocument(#[from] serde_yaml::Error),

    /// Two states in the same archetype share a name.
    #[error("archetype `{archetype}` declares state `{state}` more than once")]
    DuplicateState {
        /// Archetype tag.
        archetype: String,
        /// Offending state name.
        state: String,
    },

    /// `initial_state` does not name a declared state.
    #[error("archetype `{archetype}` initial_state `{state}` is not a declared state")]
    UnknownInitialState {
        /// Archetype tag.
        archetype: String,
        /// The unresolved name.
        state: String,
    },

    /// A transition's `to` does not name a declared state.
    #[error("archetype `{archetype}` state `{state}` has a transition to unknown state `{to}`")]
    UnknownTransitionTarget {
        /// Archetype tag.
        archetype: String,
        /// State the transition is declared on.
        state: String,
        /// The unresolved target name.
        to: String,
    },

    /// An action or condition name did not resolve to a known kind.
    #[error("archetype `{archetype}` state `{state}` uses unknown {kind} `{name}`")]
    UnknownNodeKind {
        /// Archetype tag.
        archetype: String,
        /// State the node is declared on.
        state: String,
        /// Either `"action"` or `"condition"`.
        kind: &'static str,
        /// The unresolved name.
        name: String,
    },

    /// An archetype tag was requested that no loaded document declares.
    #[error("no compiled AI config for archetype `{0}`")]
    UnknownArchetype(String),

    /// An archetype declared no states at all.
    #[error("archetype `{0}` declares no states")]
    EmptyStates(String),

    /// An archetype declared more states than a `u8` index can address.
    #[error("archetype `{archetype}` declares {count} states, exceeding the 255 limit")]
    TooManyStates {
        /// Archetype tag.
        archetype: String,
        /// The offending state count.
        count: usize,
    },
}
