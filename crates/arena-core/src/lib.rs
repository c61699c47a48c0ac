//! Deterministic simulation core: math, the actor/world data model, the
//! navigation grid, and the shared telemetry counter surface.

pub mod command;
pub mod geom;
pub mod nav;
pub mod patch;
pub mod prng;
pub mod telemetry;
pub mod tick;
pub mod world;

pub use command::{Command, CommandPayload};
pub use geom::{derive_facing, Facing, Vec2};
pub use patch::{EntityId, Patch, PatchKind};
pub use prng::{Prng, RootSeed};
pub use tick::Tick;
