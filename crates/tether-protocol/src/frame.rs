//! Length-prefixed framing.
//!
//! A stream socket delivers bytes, not messages. Every message is therefore
//! sent as one frame:
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────┐
//! │ length: u32 (BE)     │ payload: `length` bytes  │
//! └──────────────────────┴──────────────────────────┘
//! ```
//!
//! The functions here work on complete in-memory buffers. Reading a frame
//! off a live socket, where bytes trickle in, lives in the transport crate
//! and uses [`parse_length_prefix`] to validate the prefix before
//! allocating the payload buffer.

use crate::{Codec, Message, ProtocolError};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest payload a peer may announce (16 MiB).
///
/// A corrupt or hostile prefix could otherwise ask the reader to allocate
/// up to 4 GiB.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Encodes `message` with `codec` and prepends the big-endian length.
///
/// # Errors
/// - `ProtocolError::Encode` if the codec fails.
/// - `ProtocolError::FrameTooLarge` if the payload exceeds [`MAX_FRAME_LEN`].
pub fn encode_frame<C: Codec>(codec: &C, message: &Message) -> Result<Vec<u8>, ProtocolError> {
    let payload = codec.encode(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    // Fits: MAX_FRAME_LEN < u32::MAX.
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes one complete frame. Exact inverse of [`encode_frame`].
///
/// # Errors
/// - `Truncated` if `frame` is shorter than the prefix.
/// - `FrameTooLarge` if the prefix exceeds [`MAX_FRAME_LEN`].
/// - `LengthMismatch` if the prefix disagrees with the payload length.
/// - `Decode` if the payload is malformed.
pub fn decode_frame<C: Codec>(codec: &C, frame: &[u8]) -> Result<Message, ProtocolError> {
    let Some((prefix, payload)) = frame.split_first_chunk::<LENGTH_PREFIX_LEN>() else {
        return Err(ProtocolError::Truncated(frame.len()));
    };

    let declared = parse_length_prefix(*prefix)?;
    if declared != payload.len() {
        return Err(ProtocolError::LengthMismatch {
            declared,
            actual: payload.len(),
        });
    }

    codec.decode(payload)
}

/// Interprets a 4-byte big-endian length prefix.
///
/// # Errors
/// `FrameTooLarge` if the announced length exceeds [`MAX_FRAME_LEN`].
pub fn parse_length_prefix(prefix: [u8; LENGTH_PREFIX_LEN]) -> Result<usize, ProtocolError> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    Ok(len)
}
