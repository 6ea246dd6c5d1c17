//! `Server` builder, accept loop and dispatch loop.
//!
//! A running server is a handful of Tokio tasks sharing one [`Core`]:
//!
//! ```text
//!            accept loop ──▶ ConnectionTable
//!                 │
//!                 ├─ spawn ─▶ receive loop (client A) ─┐
//!                 └─ spawn ─▶ receive loop (client B) ─┤
//!                                                      ▼
//!                                            inbound queue (bounded)
//!                                                      │
//!                                                      ▼
//!                                  dispatch loop ──▶ Handler::handle
//! ```
//!
//! Every task watches the same shutdown token. `close` cancels it, waits
//! for each task, flushes what is still queued, and then closes every
//! connection.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tether_protocol::{Address, Message};
use tether_queue::{QueueError, QueueStats};
use tether_transport::TcpTransport;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::connection::Connection;
use crate::inbox::{Inbound, Inbox};
use crate::{ConnectionTable, Handler, ServerConfig, TetherError};

/// State shared by the accept, receive and dispatch tasks.
///
/// Not generic over the handler, so only the dispatch side is
/// monomorphized per application.
struct Core {
    config: ServerConfig,
    local: Address,
    table: ConnectionTable,
    inbox: Inbox,
    shutdown: CancellationToken,
    receivers: TaskTracker,
    /// First overflow seen, if any. Set once and never cleared.
    fault: StdMutex<Option<QueueError>>,
}

/// Builder for configuring and starting a [`Server`].
///
/// # Example
///
/// ```rust,ignore
/// use tether::prelude::*;
///
/// let mut server = ServerBuilder::new()
///     .bind(Address::new("0.0.0.0", 31775))
///     .queue_capacity(4096)
///     .build(MyHandler)
///     .await?;
/// server.operate()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to listen on.
    pub fn bind(mut self, addr: Address) -> Self {
        self.config.bind = addr;
        self
    }

    /// Sets the per-read timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the inbound queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Sets the dispatch poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and starts accepting connections.
    ///
    /// Requests are queued from this point on but not handled until
    /// [`Server::operate`] is called.
    pub async fn build<H: Handler>(self, handler: H) -> Result<Server<H>, TetherError> {
        Server::bind(self.config, handler).await
    }
}

/// A TCP request/response server.
///
/// Dropping a `Server` without calling [`close`](Self::close) cancels its
/// tasks but doesn't wait for them.
pub struct Server<H: Handler> {
    core: Arc<Core>,
    handler: Arc<H>,
    accept_task: Option<JoinHandle<()>>,
    dispatch_task: Option<JoinHandle<()>>,
    closed: bool,
}

impl<H: Handler> Server<H> {
    /// Binds to `config.bind` and starts the accept loop.
    ///
    /// # Errors
    /// - `Config` if a setting is out of range.
    /// - `Transport(BindFailed)` if the address can't be bound.
    pub async fn bind(config: ServerConfig, handler: H) -> Result<Self, TetherError> {
        let config = config.validated()?;
        let transport = TcpTransport::bind(&config.bind).await?;

        let core = Arc::new(Core {
            local: transport.local_addr().clone(),
            inbox: Inbox::new(config.queue_capacity)?,
            table: ConnectionTable::new(),
            shutdown: CancellationToken::new(),
            receivers: TaskTracker::new(),
            fault: StdMutex::new(None),
            config,
        });

        let accept_task = tokio::spawn(accept_loop(transport, Arc::clone(&core)));
        tracing::info!(local = %core.local, "server started");

        Ok(Self {
            core,
            handler: Arc::new(handler),
            accept_task: Some(accept_task),
            dispatch_task: None,
            closed: false,
        })
    }

    /// Starts the dispatch worker, which hands queued requests to the
    /// handler until the server is closed.
    ///
    /// # Errors
    /// - `AlreadyOperating` on a second call.
    /// - `Closed` after [`close`](Self::close) or a fatal overflow.
    pub fn operate(&mut self) -> Result<(), TetherError> {
        if self.is_closed() {
            return Err(TetherError::Closed);
        }
        if self.dispatch_task.is_some() {
            return Err(TetherError::AlreadyOperating);
        }

        let core = Arc::clone(&self.core);
        let handler = Arc::clone(&self.handler);
        self.dispatch_task = Some(tokio::spawn(dispatch_loop(core, handler)));
        tracing::debug!("dispatch worker started");
        Ok(())
    }

    /// Handles every queued entry on the calling task.
    ///
    /// Meant for servers that never call [`operate`](Self::operate), or
    /// for draining after shutdown. Running it next to an active dispatch
    /// worker splits the queue between the two and loses per-client
    /// ordering.
    ///
    /// Returns how many entries were handled.
    pub async fn flush(&self) -> usize {
        let mut handled = 0;
        while let Some(item) = self.core.inbox.pop() {
            dispatch(&self.core, self.handler.as_ref(), item).await;
            handled += 1;
        }
        handled
    }

    /// Sends `message` to every open connection. Returns how many it
    /// reached.
    pub async fn send_all(&self, message: &Message) -> usize {
        self.core.table.send_all(message).await
    }

    /// Stops the server. Idempotent.
    ///
    /// In order: stop accepting and dispatching, release the listener,
    /// wait for every receive worker, handle whatever is still queued,
    /// then close every connection and empty the table.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        tracing::info!(local = %self.core.local, "server closing");

        self.core.shutdown.cancel();

        for task in [self.accept_task.take(), self.dispatch_task.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "server task failed");
            }
        }

        self.core.receivers.close();
        self.core.receivers.wait().await;

        let flushed = self.flush().await;
        if flushed > 0 {
            tracing::debug!(flushed, "flushed queued requests");
        }

        let connections = self.core.table.drain().await;
        let count = connections.len();
        for conn in connections {
            conn.close().await;
        }
        tracing::info!(connections = count, "server closed");
    }

    /// The overflow that stopped the server, if one did.
    pub fn fault(&self) -> Option<QueueError> {
        self.core
            .fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The address actually bound. Differs from the configured one when
    /// binding port 0.
    pub fn local_addr(&self) -> &Address {
        &self.core.local
    }

    pub fn config(&self) -> &ServerConfig {
        &self.core.config
    }

    /// The live connection table.
    pub fn table(&self) -> &ConnectionTable {
        &self.core.table
    }

    pub async fn connection_count(&self) -> usize {
        self.core.table.len().await
    }

    pub async fn contains(&self, address: &Address) -> bool {
        self.core.table.contains(address).await
    }

    pub async fn addresses(&self) -> Vec<Address> {
        self.core.table.addresses().await
    }

    /// Cursor snapshot of the inbound queue.
    pub fn inbound_stats(&self) -> QueueStats {
        self.core.inbox.stats()
    }

    /// `true` once [`close`](Self::close) has run or an overflow has shut
    /// the server down.
    pub fn is_closed(&self) -> bool {
        self.closed || self.core.shutdown.is_cancelled()
    }

    /// `true` while the dispatch worker is running.
    pub fn is_operating(&self) -> bool {
        !self.is_closed() && self.dispatch_task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl<H: Handler> Drop for Server<H> {
    fn drop(&mut self) {
        self.core.shutdown.cancel();
    }
}

impl<H: Handler> std::fmt::Debug for Server<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local", &self.core.local)
            .field("inbound", &self.core.inbox.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Accept loop
// ---------------------------------------------------------------------------

async fn accept_loop(transport: TcpTransport, core: Arc<Core>) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = core.shutdown.cancelled() => break,
            accepted = transport.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => admit(&core, stream, peer).await,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                tokio::select! {
                    _ = core.shutdown.cancelled() => break,
                    _ = time::sleep(core.config.poll_interval) => {}
                }
            }
        }
    }
    tracing::debug!(local = %core.local, "accept loop stopped");
}

/// Registers a freshly accepted socket and starts its receive worker.
async fn admit(core: &Arc<Core>, stream: TcpStream, peer: Address) {
    let conn = Arc::new(Connection::new(
        stream,
        peer.clone(),
        core.shutdown.child_token(),
        core.config.timeout,
    ));

    if let Some(stale) = core.table.insert(Arc::clone(&conn)).await {
        tracing::debug!(%peer, "replacing stale connection");
        stale.close().await;
    }
    tracing::info!(%peer, "client connected");

    let shared = Arc::clone(core);
    core.receivers.spawn(async move {
        if let Err(e) = conn.receive_loop(&shared.inbox, &shared.shutdown).await {
            overflow(&shared, &conn, e).await;
        }
    });
}

/// A full inbound queue means the dispatcher can't keep up. Stop everything
/// rather than drop requests.
async fn overflow(core: &Core, conn: &Connection, error: QueueError) {
    tracing::error!(peer = %conn.address(), error = %error, "inbound queue overflow, shutting down");

    core.fault
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get_or_insert(error);

    core.shutdown.cancel();
    conn.close().await;
}

// ---------------------------------------------------------------------------
// Dispatch loop
// ---------------------------------------------------------------------------

async fn dispatch_loop<H: Handler>(core: Arc<Core>, handler: Arc<H>) {
    loop {
        while let Some(item) = core.inbox.pop() {
            dispatch(&core, handler.as_ref(), item).await;
            if core.shutdown.is_cancelled() {
                break;
            }
        }

        tokio::select! {
            biased;
            _ = core.shutdown.cancelled() => break,
            _ = core.inbox.ready() => {}
            _ = time::sleep(core.config.poll_interval) => {}
        }
    }
    tracing::debug!("dispatch loop stopped");
}

async fn dispatch<H: Handler>(core: &Core, handler: &H, item: Inbound) {
    match item {
        Inbound::Disconnected { from } => {
            if core.table.remove_closed(&from).await.is_some() {
                tracing::info!(peer = %from, "client disconnected");
            }
        }
        Inbound::Message { from, message } => {
            let peer = from.clone();
            if let Err(e) = handler.handle(&core.table, from, message).await {
                tracing::warn!(%peer, error = %e, "handler failed");
            }
        }
    }
}
