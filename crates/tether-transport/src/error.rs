use std::io;

use tether_protocol::{Address, ProtocolError};

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Writing a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),

    /// Accepting an incoming connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: Address,
        #[source]
        source: io::Error,
    },

    /// The outbound connection could not be established.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: Address,
        #[source]
        source: io::Error,
    },

    /// The address has no host to bind or connect to.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A frame was received but could not be decoded, or a message could
    /// not be framed for sending.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl TransportError {
    /// Returns the underlying I/O error, if any.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Self::SendFailed(e) | Self::ReceiveFailed(e) | Self::AcceptFailed(e) => Some(e),
            Self::BindFailed { source, .. } | Self::ConnectFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// `true` if the peer dropped the connection underneath us.
    ///
    /// Covers reset, aborted, broken-pipe and not-connected. These are
    /// worth retrying on the client side and are routine on the server.
    pub fn is_reset(&self) -> bool {
        self.io_error().is_some_and(|e| {
            matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
            )
        })
    }

    /// `true` if a read stalled partway through a frame.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReceiveFailed(e) if e.kind() == io::ErrorKind::TimedOut)
    }
}
