//! Server and client settings.
//!
//! Both structs are plain data with sensible defaults, so they can be built
//! in code or deserialized from whatever config format the application
//! already uses. Values are checked once, when the server or client is
//! constructed.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_protocol::Address;

use crate::TetherError;

/// Default socket timeout for both sides.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default inbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default wait between dispatch polls when the inbound queue is empty.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Settings for a [`Server`](crate::Server).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on. Port 0 picks a free port.
    pub bind: Address,

    /// How long a receive worker waits for a frame before counting the
    /// period as idle. Also bounds each read once a frame has started.
    pub timeout: Duration,

    /// Capacity of the inbound queue shared by all connections.
    pub queue_capacity: usize,

    /// Upper bound on how long the dispatch worker sleeps when the
    /// queue is empty. Wakeups normally come sooner, on enqueue.
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: Address::default(),
            timeout: DEFAULT_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ServerConfig {
    /// Checks every field, returning the config unchanged if it is usable.
    pub fn validated(self) -> Result<Self, TetherError> {
        if self.queue_capacity == 0 {
            return Err(TetherError::Config("queue_capacity must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(TetherError::Config("timeout must be non-zero".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(TetherError::Config("poll_interval must be non-zero".into()));
        }
        Ok(self)
    }
}

/// Settings for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connect timeout, and how long a single read waits before retrying.
    pub timeout: Duration,

    /// Upper bound on a whole `request` call. `None` waits forever.
    pub request_deadline: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            request_deadline: None,
        }
    }
}

impl ClientConfig {
    /// Checks every field, returning the config unchanged if it is usable.
    pub fn validated(self) -> Result<Self, TetherError> {
        if self.timeout.is_zero() {
            return Err(TetherError::Config("timeout must be non-zero".into()));
        }
        if self.request_deadline.is_some_and(|d| d.is_zero()) {
            return Err(TetherError::Config("request_deadline must be non-zero".into()));
        }
        Ok(self)
    }
}
