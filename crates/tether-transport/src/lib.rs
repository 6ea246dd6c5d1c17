//! TCP transport for Tether.
//!
//! Two halves:
//!
//! - [`TcpTransport`] and [`connect`] set up sockets.
//! - [`read_frame`] and [`write_frame`] move length-prefixed frames over
//!   any async byte stream.
//!
//! Reading distinguishes three outcomes that a bare `read` conflates: a
//! whole message, a quiet peer ([`ReadOutcome::Idle`]), and a gone peer
//! ([`ReadOutcome::Disconnected`]). Callers decide what an idle period
//! means; this crate never closes a stream on its own.

mod error;
mod frame_io;
mod tcp;

pub use error::TransportError;
pub use frame_io::{ReadOutcome, read_frame, write_frame};
pub use tcp::{TcpTransport, connect};
