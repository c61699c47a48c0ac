//! Inbound wire messages: what a connected client may send (spec.md §6
//! "Inbound messages"). Transport framing/codec selection is out of scope;
//! this only defines the serde-friendly shape.

use serde::{Deserialize, Serialize};

use arena_core::world::ActorId;
use arena_core::{Facing, Vec2};

/// One message a client may send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundMessage {
    /// A movement/aim intent for this tick.
    Input {
        /// Desired horizontal delta.
        dx: f32,
        /// Desired vertical delta.
        dy: f32,
        /// Facing to adopt.
        facing: Facing,
        /// Client protocol/build version, echoed for diagnostics.
        ver: u32,
        /// Last broadcast sequence the client has applied, for RTT/ack
        /// accounting. Not consulted by the core itself.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ack: Option<u64>,
    },
    /// Request a path toward a world-space point.
    Path {
        /// Destination x.
        x: f32,
        /// Destination y.
        y: f32,
    },
    /// Cancel any in-progress path.
    CancelPath,
    /// Perform an ability/action.
    Action {
        /// Designer-facing action/ability name.
        action: String,
        /// Optional explicit target actor id, as carried on the wire.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<ActorId>,
    },
    /// Liveness signal.
    Heartbeat {
        /// Client-reported send time (ms since epoch), echoed back for RTT
        /// accounting.
        sent_at: u64,
    },
    /// Requests a specific keyframe by sequence, outside the normal tick
    /// cadence (spec.md §4.6).
    RequestKeyframe {
        /// The sequence being requested.
        sequence: u64,
    },
}

impl InboundMessage {
    /// The destination point carried by a `Path` message.
    #[must_use]
    pub fn path_target(&self) -> Option<Vec2> {
        match self {
            Self::Path { x, y } => Some(Vec2::new(*x, *y)),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn input_round_trips_through_json() {
        let msg = InboundMessage::Input {
            dx: 1.0,
            dy: 0.0,
            facing: Facing::Right,
            ver: 3,
            ack: Some(42),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"input\""));
        let back: InboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn path_target_extracts_point() {
        let msg = InboundMessage::Path { x: 3.0, y: 4.0 };
        assert_eq!(msg.path_target(), Some(Vec2::new(3.0, 4.0)));
        assert_eq!(InboundMessage::CancelPath.path_target(), None);
    }
}
