//! Error types for the protocol layer.
//!
//! Each Tether crate defines its own error enum. A `ProtocolError` always
//! means the bytes or values were wrong, never that the network was.

/// Errors that can occur while encoding, decoding or framing messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a value into payload bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed: malformed, truncated or mistyped payload.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The value decoded fine but is not a valid message
    /// (e.g. the top level is not an object).
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A frame buffer is shorter than the 4-byte length prefix.
    #[error("truncated frame: {0} bytes, need at least 4")]
    Truncated(usize),

    /// The length prefix disagrees with the number of payload bytes.
    #[error("frame length mismatch: prefix says {declared} bytes, found {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// The frame is larger than [`MAX_FRAME_LEN`](crate::MAX_FRAME_LEN).
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// A string could not be parsed as `host:port`.
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),
}
