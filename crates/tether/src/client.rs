//! Request/response client.

use tether_protocol::{Address, JsonCodec, Message};
use tether_transport::{ReadOutcome, TransportError, read_frame, write_frame};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;

use crate::{ClientConfig, TetherError};

/// A connection to a Tether server.
///
/// Requests are strictly one at a time: [`request`](Self::request) takes
/// `&mut self`, so a second request can't start until the first has its
/// response.
///
/// ```rust,ignore
/// let mut client = Client::connect(&addr, ClientConfig::default()).await?;
/// let reply = client.request(&Message::new().with("k", 52)).await?;
/// ```
#[derive(Debug)]
pub struct Client {
    peer: Address,
    config: ClientConfig,
    /// `None` once closed.
    stream: Option<TcpStream>,
    codec: JsonCodec,
}

impl Client {
    /// Connects to `peer`. Fails straight away if nobody is listening.
    pub async fn connect(peer: &Address, config: ClientConfig) -> Result<Self, TetherError> {
        let config = config.validated()?;
        let stream = tether_transport::connect(peer, config.timeout).await?;
        tracing::debug!(%peer, "client connected");

        Ok(Self {
            peer: peer.clone(),
            config,
            stream: Some(stream),
            codec: JsonCodec,
        })
    }

    /// Sends one request without waiting for a response.
    ///
    /// # Errors
    /// - `Closed` if the client was closed.
    /// - `Protocol` if the message can't be encoded. The client stays open.
    /// - `Transport(SendFailed)` if the write fails. The client is closed.
    pub async fn send(&mut self, message: &Message) -> Result<(), TetherError> {
        let stream = self.stream.as_mut().ok_or(TetherError::Closed)?;

        match write_frame(stream, &self.codec, message).await {
            Ok(()) => Ok(()),
            Err(TransportError::Protocol(e)) => Err(e.into()),
            Err(e) => {
                self.close().await;
                Err(e.into())
            }
        }
    }

    /// Waits for the next message from the server.
    ///
    /// Quiet periods and connection resets are retried; the call returns
    /// only with a message or a terminal error.
    ///
    /// # Errors
    /// - `Closed` if the client was closed.
    /// - `Disconnected` if the server closed the connection.
    /// - `Transport` or `Protocol` for anything else. The client is closed.
    pub async fn recv(&mut self) -> Result<Message, TetherError> {
        loop {
            let stream = self.stream.as_mut().ok_or(TetherError::Closed)?;

            match read_frame(stream, &self.codec, self.config.timeout).await {
                Ok(ReadOutcome::Message(message)) => return Ok(message),
                Ok(ReadOutcome::Idle) => {
                    tracing::trace!(peer = %self.peer, "still waiting for response");
                }
                Ok(ReadOutcome::Disconnected) => {
                    self.close().await;
                    return Err(TetherError::Disconnected);
                }
                Err(e) if e.is_reset() => {
                    tracing::debug!(peer = %self.peer, error = %e, "connection reset, retrying");
                }
                Err(e) => {
                    self.close().await;
                    return Err(e.into());
                }
            }
        }
    }

    /// Sends `message` and waits for the response.
    ///
    /// With a `request_deadline` configured, the whole exchange is bounded
    /// by it; on expiry the client is closed, since a late response would
    /// otherwise be read as the answer to the next request.
    pub async fn request(&mut self, message: &Message) -> Result<Message, TetherError> {
        let Some(deadline) = self.config.request_deadline else {
            return self.round_trip(message).await;
        };

        match time::timeout(deadline, self.round_trip(message)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                tracing::warn!(peer = %self.peer, ?deadline, "request deadline elapsed");
                self.close().await;
                Err(TetherError::DeadlineElapsed)
            }
        }
    }

    /// Closes the connection. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::trace!(peer = %self.peer, error = %e, "shutdown after close");
            }
            tracing::debug!(peer = %self.peer, "client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// The server this client talks to.
    pub fn peer(&self) -> &Address {
        &self.peer
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn round_trip(&mut self, message: &Message) -> Result<Message, TetherError> {
        self.send(message).await?;
        self.recv().await
    }
}
