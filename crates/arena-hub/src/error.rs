//! Errors raised while driving the tick loop or servicing subscribers.

use arena_core::world::ActorId;
use thiserror::Error;

/// Failures surfaced by [`crate::hub::Hub`] and its collaborators.
#[derive(Debug, Error)]
pub enum HubError {
    /// A command named an actor that does not exist in either the player or
    /// NPC maps.
    #[error("unknown actor {0:?}")]
    UnknownActor(ActorId),

    /// The embedded AI archetype library failed to compile at startup.
    #[error("failed to load AI library: {0}")]
    AiLoad(#[from] arena_ai::AiError),

    /// The embedded effect definitions failed to compile at startup.
    #[error("failed to load effect definitions: {0}")]
    EffectLoad(#[from] arena_effects::EffectError),
}
