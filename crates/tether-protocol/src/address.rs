//! Network addresses.
//!
//! An [`Address`] is the identity of a peer. The server keys its
//! connection table by it, and every inbound message carries the address
//! it came from.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Host used by [`Address::default`].
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port used by [`Address::default`].
pub const DEFAULT_PORT: u16 = 31775;

/// An immutable host/port pair.
///
/// Equality and hashing are structural, so two addresses built from the
/// same host string and port are interchangeable as map keys. The host is
/// kept as written (a hostname or an IP literal); it is only resolved when
/// a socket is bound or connected.
///
/// ```rust
/// use tether_protocol::Address;
///
/// let addr: Address = "127.0.0.1:8080".parse().unwrap();
/// assert_eq!(addr.host(), "127.0.0.1");
/// assert_eq!(addr.port(), 8080);
/// assert_eq!(addr.to_string(), "127.0.0.1:8080");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    /// Creates an address from a host and a port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the host part.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port part.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the `(host, port)` pair accepted by Tokio's bind/connect
    /// functions.
    pub fn as_pair(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // IPv6 literals need brackets to stay parseable.
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl FromStr for Address {
    type Err = ProtocolError;

    /// Parses `host:port` or `[ipv6]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidAddress(s.to_string());

        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if host.is_empty() {
            return Err(invalid());
        }
        let port: u16 = port.parse().map_err(|_| invalid())?;

        Ok(Self::new(host, port))
    }
}
