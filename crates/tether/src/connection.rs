//! Server-side view of one accepted client.
//!
//! A [`Connection`] owns both halves of the socket. The read half is used
//! only by the connection's receive worker; the write half is shared by
//! anyone replying to this client (the handler, `send_all`), so each write
//! takes the writer lock for the duration of one frame. That keeps frames
//! from interleaving on the wire.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tether_protocol::{Address, JsonCodec, Message};
use tether_queue::QueueError;
use tether_transport::{ReadOutcome, TransportError, read_frame, write_frame};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::inbox::{Inbound, Inbox};

/// One accepted client socket.
#[derive(Debug)]
pub struct Connection {
    address: Address,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    closed: AtomicBool,
    /// Child of the server's shutdown token. Cancelled by `close`.
    cancel: CancellationToken,
    timeout: Duration,
    codec: JsonCodec,
}

impl Connection {
    pub(crate) fn new(
        stream: TcpStream,
        address: Address,
        cancel: CancellationToken,
        timeout: Duration,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            address,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
            cancel,
            timeout,
            codec: JsonCodec,
        }
    }

    /// The client's address. Also its key in the connection table.
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Writes `message` to the client as one frame.
    ///
    /// Returns `false` if the connection is closed or the write fails. A
    /// failed write closes the connection; a message too large to encode
    /// is refused without touching the socket.
    ///
    /// A client that stops reading gets one timeout's grace before the
    /// write counts as failed.
    pub async fn send(&self, message: &Message) -> bool {
        if self.is_closed() {
            return false;
        }

        let result = {
            let mut writer = self.writer.lock().await;
            time::timeout(self.timeout, write_frame(&mut *writer, &self.codec, message))
                .await
                .unwrap_or_else(|_elapsed| {
                    Err(TransportError::SendFailed(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "send timed out",
                    )))
                })
        };

        match result {
            Ok(()) => true,
            Err(TransportError::Protocol(e)) => {
                tracing::warn!(peer = %self.address, error = %e, "message not sent");
                false
            }
            Err(e) => {
                tracing::debug!(peer = %self.address, error = %e, "send failed, closing");
                self.close().await;
                false
            }
        }
    }

    /// Reads at most one frame and queues what it finds.
    ///
    /// `Ok(true)` means keep going: a message was queued or the client
    /// was quiet for a whole timeout. `Ok(false)` means the connection is
    /// finished and a disconnect sentinel has been queued.
    ///
    /// # Errors
    /// Overflow of the inbound queue. Nothing is retried.
    pub(crate) async fn receive_once(&self, inbox: &Inbox) -> Result<bool, QueueError> {
        let outcome = {
            let mut reader = self.reader.lock().await;
            read_frame(&mut *reader, &self.codec, self.timeout).await
        };

        match outcome {
            Ok(ReadOutcome::Message(message)) => {
                tracing::trace!(peer = %self.address, "request queued");
                inbox.push(Inbound::Message {
                    from: self.address.clone(),
                    message,
                })?;
                Ok(true)
            }
            Ok(ReadOutcome::Idle) => Ok(true),
            Ok(ReadOutcome::Disconnected) => {
                tracing::debug!(peer = %self.address, "peer closed the connection");
                self.finish(inbox)
            }
            Err(e @ TransportError::Protocol(_)) => {
                tracing::warn!(peer = %self.address, error = %e, "malformed frame, dropping connection");
                self.finish(inbox)
            }
            Err(e) => {
                tracing::debug!(peer = %self.address, error = %e, "receive failed");
                self.finish(inbox)
            }
        }
    }

    /// Receives until the connection ends or the server shuts down.
    ///
    /// Exactly one disconnect sentinel is queued per connection that ends
    /// while the server is still running. On server shutdown nothing is
    /// queued; the table is emptied by `close` instead.
    pub(crate) async fn receive_loop(
        &self,
        inbox: &Inbox,
        shutdown: &CancellationToken,
    ) -> Result<(), QueueError> {
        while !self.is_closed() {
            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                step = self.receive_once(inbox) => step?,
            };
            if !step {
                return Ok(());
            }
        }

        // Closed locally: by a failed send, a replacement, or an overflow.
        if !shutdown.is_cancelled() {
            inbox.push(Inbound::Disconnected {
                from: self.address.clone(),
            })?;
        }
        Ok(())
    }

    /// Closes the connection. Idempotent.
    ///
    /// Interrupts the receive worker and shuts the write half down, which
    /// the client sees as end of stream.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            tracing::trace!(peer = %self.address, error = %e, "shutdown after close");
        }
        tracing::debug!(peer = %self.address, "connection closed");
    }

    fn finish(&self, inbox: &Inbox) -> Result<bool, QueueError> {
        self.closed.store(true, Ordering::Release);
        self.cancel.cancel();
        inbox.push(Inbound::Disconnected {
            from: self.address.clone(),
        })?;
        Ok(false)
    }
}
