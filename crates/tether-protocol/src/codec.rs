//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and payload bytes.
//! The framing layer doesn't care HOW a message is serialized, only that
//! client and server agree. Swapping the format means swapping the
//! [`Codec`] implementation; nothing else changes.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds
///
/// - `Send + Sync` → one codec value is shared by every connection task.
/// - `Clone` → cheap to hand a copy to each connection.
/// - `'static` → it owns everything it needs.
///
/// The format must be self-describing: a [`Message`](crate::Message) is a
/// schema-less tree, so the decoder has to recover maps, sequences,
/// numbers, strings and booleans without outside help.
pub trait Codec: Send + Sync + Clone + 'static {
    /// Serializes a value into payload bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes payload bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON keeps frames readable in a packet capture. `serde_json` is built
/// with `float_roundtrip`, so every finite `f64` decodes to the exact bits
/// it was encoded from.
///
/// ## Example
///
/// ```rust
/// use tether_protocol::{Codec, JsonCodec, Message, json};
///
/// let codec = JsonCodec;
/// let msg = Message::try_from(json!({"balls": [[1.5, 2.0]], "paused": false})).unwrap();
///
/// let bytes = codec.encode(&msg).unwrap();
/// let decoded: Message = codec.decode(&bytes).unwrap();
/// assert_eq!(msg, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
