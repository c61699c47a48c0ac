//! CBOR framing helpers, mirroring the teacher's length-prefixed-CBOR
//! session wire (spec.md §1: the byte-level framing itself belongs to a
//! transport crate; this only gives that crate something to call).

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Failures encoding/decoding a wire message.
#[derive(Debug, Error)]
pub enum WireError {
    /// CBOR serialization failed.
    #[error("cbor encode error: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),
    /// CBOR deserialization failed.
    #[error("cbor decode error: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
    /// The buffer held fewer bytes than the length prefix declared.
    #[error("incomplete frame: need {needed} bytes, have {have}")]
    Incomplete {
        /// Total bytes the frame requires once headers are accounted for.
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },
}

/// Serializes `value` to CBOR bytes.
///
/// # Errors
/// Returns [`WireError::Encode`] if `value` cannot be represented in CBOR.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out)?;
    Ok(out)
}

/// Deserializes a value from CBOR bytes.
///
/// # Errors
/// Returns [`WireError::Decode`] if `bytes` is not valid CBOR for `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    Ok(ciborium::from_reader(bytes)?)
}

/// Encodes `value` as a length-prefixed CBOR frame: a 4-byte big-endian
/// length followed by the CBOR body.
///
/// # Errors
/// Returns [`WireError::Encode`] if `value` cannot be represented in CBOR.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let body = to_cbor(value)?;
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&u32::try_from(body.len()).unwrap_or(u32::MAX).to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decodes a length-prefixed CBOR frame from the front of `stream`,
/// returning the value and the number of bytes consumed.
///
/// # Errors
/// Returns [`WireError::Incomplete`] if `stream` doesn't yet hold a full
/// frame, or [`WireError::Decode`] if the body isn't valid CBOR for `T`.
pub fn decode_frame<T: DeserializeOwned>(stream: &[u8]) -> Result<(T, usize), WireError> {
    if stream.len() < 4 {
        return Err(WireError::Incomplete {
            needed: 4,
            have: stream.len(),
        });
    }
    let len = u32::from_be_bytes([stream[0], stream[1], stream[2], stream[3]]) as usize;
    if stream.len() < 4 + len {
        return Err(WireError::Incomplete {
            needed: 4 + len,
            have: stream.len(),
        });
    }
    let value = from_cbor(&stream[4..4 + len])?;
    Ok((value, 4 + len))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::inbound::InboundMessage;
    use arena_core::Facing;

    #[test]
    fn frame_round_trips() {
        let msg = InboundMessage::Heartbeat { sent_at: 12_345 };
        let frame = encode_frame(&msg).unwrap();
        let (decoded, consumed): (InboundMessage, usize) = decode_frame(&frame).unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn incomplete_frame_is_reported() {
        let msg = InboundMessage::Input {
            dx: 1.0,
            dy: 0.0,
            facing: Facing::Right,
            ver: 1,
            ack: None,
        };
        let frame = encode_frame(&msg).unwrap();
        let err = decode_frame::<InboundMessage>(&frame[..frame.len() - 1]).unwrap_err();
        assert!(matches!(err, WireError::Incomplete { .. }));
    }
}
