//! # Tether
//!
//! Length-prefixed JSON request/response over TCP.
//!
//! A [`Server`] accepts any number of clients. Every frame a client sends
//! is decoded into a [`Message`] and placed on one bounded inbound queue;
//! a single dispatch worker takes messages off that queue in order and
//! hands each to your [`Handler`]. A [`Client`] sends a request and waits
//! for the response.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether::prelude::*;
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     async fn handle(
//!         &self,
//!         table: &ConnectionTable,
//!         from: Address,
//!         message: Message,
//!     ) -> Result<(), HandlerError> {
//!         table.send_to(&from, &message).await;
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), TetherError> {
//! tether::init_tracing();
//!
//! let mut server = ServerBuilder::new()
//!     .bind(Address::new("127.0.0.1", 0))
//!     .build(Echo)
//!     .await?;
//! server.operate()?;
//!
//! let mut client = Client::connect(server.local_addr(), ClientConfig::default()).await?;
//! let reply = client.request(&Message::new().with("k", 52)).await?;
//! assert_eq!(reply["k"], 52);
//!
//! client.close().await;
//! server.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure model
//!
//! - A quiet client is fine; connections are never timed out for idling.
//! - A client that disconnects or sends a malformed frame is dropped and
//!   removed from the table. The handler never sees it.
//! - A full inbound queue is fatal: the server logs at `error`, records
//!   the fault ([`Server::fault`]) and shuts down.

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod auto_update;
mod client;
mod config;
mod connection;
mod error;
mod handler;
mod inbox;
mod server;
mod table;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use auto_update::AutoUpdater;
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY, DEFAULT_TIMEOUT, ServerConfig};
pub use connection::Connection;
pub use error::{HandlerError, TetherError};
pub use handler::Handler;
pub use inbox::Inbound;
pub use server::{Server, ServerBuilder};
pub use table::ConnectionTable;

pub use tether_protocol::{Address, Message, Value, json};
pub use tether_queue::{QueueError, QueueStats};

/// Installs a `tracing` subscriber that prints to stdout.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling this
/// more than once, or after another subscriber is installed, does nothing.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Everything needed to write a handler, run a server, or talk to one.
pub mod prelude {
    pub use crate::{
        Address, AutoUpdater, Client, ClientConfig, ConnectionTable, Handler, HandlerError,
        Message, Server, ServerBuilder, ServerConfig, TetherError, json,
    };
}
