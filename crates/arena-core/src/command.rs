//! Commands: the single input vocabulary accepted by the world step,
//! produced by both transport-facing inbound message translation and the AI
//! executor (spec.md §3, §4.1, §6).

use crate::geom::{Facing, Vec2};
use crate::tick::Tick;
use crate::world::ActorId;

/// A kind-specific command payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandPayload {
    /// Move with a velocity intent and a facing.
    Move {
        /// Desired velocity delta.
        delta: Vec2,
        /// Facing to adopt.
        facing: Facing,
    },
    /// Perform an ability/action.
    Action {
        /// Designer-facing action/ability name.
        action: String,
        /// Optional explicit target.
        target: Option<ActorId>,
        /// The effect definition this ability resolves to, when the issuer
        /// already knows it (e.g. the AI executor's authored
        /// `use-ability` action). `None` for a player-issued action, which
        /// the world step resolves by treating `action` itself as the
        /// effect type id.
        effect_type_id: Option<String>,
    },
    /// Liveness signal from a connected client.
    Heartbeat {
        /// Client-reported send time, echoed back for RTT accounting.
        sent_at_ms: u64,
    },
    /// Request a path toward a world-space point.
    SetPath {
        /// Destination point.
        target: Vec2,
    },
    /// Cancel any in-progress path.
    ClearPath,
}

/// A single unit of simulation input: one actor's command for one tick.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Command {
    /// Tick this command was staged for (the tick it will apply on).
    pub origin_tick: Tick,
    /// Actor this command applies to.
    pub actor_id: ActorId,
    /// Wall-clock time (ms since epoch) the command was issued/received.
    pub issued_at_ms: u64,
    /// Kind-specific payload.
    pub payload: CommandPayload,
}
