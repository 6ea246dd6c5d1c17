//! Wire format for Tether.
//!
//! This crate defines what travels between a client and a server:
//!
//! - **Types** ([`Address`], [`Message`]): who is talking and what they say.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how a message becomes
//!   bytes and back.
//! - **Frames** ([`encode_frame`], [`decode_frame`]): how those bytes are
//!   delimited on a stream socket: a 4-byte big-endian length prefix
//!   followed by exactly that many payload bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding or
//!   decoding.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets. The transport crate
//! reads and writes frames on streams; this crate only turns values into
//! frames and frames into values.
//!
//! ```text
//! Message ──codec──▶ payload ──frame──▶ [len: u32 BE][payload] ──▶ socket
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod address;
mod codec;
mod error;
mod frame;
mod message;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

// Users write `use tether_protocol::Message` rather than reaching into the
// submodules.

pub use address::{Address, DEFAULT_HOST, DEFAULT_PORT};
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use frame::{
    LENGTH_PREFIX_LEN, MAX_FRAME_LEN, decode_frame, encode_frame,
    parse_length_prefix,
};
pub use message::Message;

/// Re-exported so callers can build message values without adding
/// `serde_json` themselves.
pub use serde_json::{Value, json};
