//! Declarative NPC AI: a YAML authoring format compiled into integer-keyed
//! dispatch tables, and a per-tick executor that runs them against the
//! shared world model.

pub mod authoring;
pub mod compiled;
pub mod error;
pub mod executor;
pub mod library;

pub use compiled::CompiledAiConfig;
pub use error::AiError;
pub use executor::{run_tick, MAX_DECISIONS_PER_TICK};
pub use library::AiLibrary;
