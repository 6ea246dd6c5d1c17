//! Live connections, keyed by client address.

use std::collections::HashMap;
use std::sync::Arc;

use tether_protocol::{Address, Message};
use tokio::sync::Mutex;

use crate::connection::Connection;

/// The server's set of open connections.
///
/// Handlers receive a reference to this table so they can reply
/// ([`send_to`](Self::send_to)) or broadcast ([`send_all`](Self::send_all)).
/// The lock is only held to look entries up; sends happen on a snapshot of
/// the entries, so a slow client never blocks the table.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: Mutex<HashMap<Address, Arc<Connection>>>,
}

impl ConnectionTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sends `message` to the connection at `to`.
    ///
    /// Returns `false` if there is no such connection or the send failed.
    pub async fn send_to(&self, to: &Address, message: &Message) -> bool {
        match self.get(to).await {
            Some(conn) => conn.send(message).await,
            None => {
                tracing::debug!(peer = %to, "send to unknown connection");
                false
            }
        }
    }

    /// Sends `message` to every open connection. A failing client doesn't
    /// stop delivery to the rest.
    ///
    /// Returns the number of clients the message reached.
    pub async fn send_all(&self, message: &Message) -> usize {
        let targets: Vec<_> = self.connections.lock().await.values().cloned().collect();

        let mut delivered = 0;
        for conn in &targets {
            if conn.send(message).await {
                delivered += 1;
            }
        }
        tracing::trace!(delivered, total = targets.len(), "broadcast");
        delivered
    }

    pub async fn get(&self, address: &Address) -> Option<Arc<Connection>> {
        self.connections.lock().await.get(address).cloned()
    }

    pub async fn contains(&self, address: &Address) -> bool {
        self.connections.lock().await.contains_key(address)
    }

    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }

    /// Addresses of every connection, sorted.
    pub async fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<_> = self.connections.lock().await.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// Adds `conn`, returning whatever was registered under its address.
    pub(crate) async fn insert(&self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        let address = conn.address().clone();
        self.connections.lock().await.insert(address, conn)
    }

    /// Removes the entry at `address` if that connection is closed.
    ///
    /// A disconnect sentinel names an address, not a connection. If the
    /// address has since been taken by a fresh connection, the fresh one
    /// stays.
    pub(crate) async fn remove_closed(&self, address: &Address) -> Option<Arc<Connection>> {
        let mut connections = self.connections.lock().await;
        if connections.get(address).is_some_and(|conn| conn.is_closed()) {
            connections.remove(address)
        } else {
            None
        }
    }

    /// Empties the table, handing back every connection.
    pub(crate) async fn drain(&self) -> Vec<Arc<Connection>> {
        self.connections.lock().await.drain().map(|(_, conn)| conn).collect()
    }
}
