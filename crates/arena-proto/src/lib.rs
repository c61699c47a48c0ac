//! Wire schema for the arena simulation core (spec.md §6 "External
//! Interfaces"). Plain serde-friendly types only: the HTTP/WebSocket
//! transport and its byte-level framing are out of scope (spec.md §1); a
//! transport crate elsewhere in a full deployment serializes these with
//! whatever codec it chooses, mirroring [`wire`]'s length-prefixed CBOR.

pub mod console;
pub mod envelope;
pub mod inbound;
pub mod wire;

pub use console::{AckReason, ConsoleAck, ConsoleCommand};
pub use envelope::{EffectTrigger, EnvelopeHeader, JoinAck, StateEnvelope, StateSnapshot, PROTOCOL_VERSION};
pub use inbound::InboundMessage;
