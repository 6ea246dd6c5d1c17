//! Unified error type for Tether.

use tether_protocol::{Address, ProtocolError};
use tether_queue::QueueError;
use tether_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapper variant generates a `From`
/// impl, so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    /// A transport-level error (bind, connect, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, framing).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The inbound queue rejected an item.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// A configuration value was rejected at construction.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The server or client has already been closed.
    #[error("closed")]
    Closed,

    /// The peer went away while a response was expected.
    #[error("peer disconnected")]
    Disconnected,

    /// A request did not complete within the client's request deadline.
    #[error("request deadline elapsed")]
    DeadlineElapsed,

    /// `Server::operate` was called while the dispatch worker was running.
    #[error("server is already operating")]
    AlreadyOperating,

    /// A background worker panicked or was aborted.
    #[error("worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Errors a [`Handler`](crate::Handler) can report.
///
/// The dispatch worker logs these and moves on to the next message; they
/// never stop the server.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The request was understood but refused.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// A reply could not be delivered, usually because the requester is
    /// already gone.
    #[error("reply to {0} was not delivered")]
    Undelivered(Address),

    /// Anything else the handler wants to surface.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
