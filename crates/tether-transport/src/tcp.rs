//! TCP listener and connector.

use std::io;
use std::time::Duration;

use tether_protocol::Address;
use tokio::net::{TcpListener, TcpStream};
use tokio::time;

use crate::TransportError;

/// A bound TCP listener that hands out accepted streams.
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
    local: Address,
}

impl TcpTransport {
    /// Binds a listener to `addr`. Port 0 picks a free port; read it back
    /// with [`local_addr`](Self::local_addr).
    pub async fn bind(addr: &Address) -> Result<Self, TransportError> {
        check_host(addr)?;
        let bind_failed = |source| TransportError::BindFailed {
            addr: addr.clone(),
            source,
        };

        let listener = TcpListener::bind(addr.as_pair()).await.map_err(bind_failed)?;
        let local = Address::from(listener.local_addr().map_err(bind_failed)?);

        tracing::info!(%local, "tcp transport listening");
        Ok(Self { listener, local })
    }

    /// Waits for the next incoming connection.
    ///
    /// Cancel-safe: dropping the future before it completes loses no
    /// connection.
    pub async fn accept(&self) -> Result<(TcpStream, Address), TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let peer = Address::from(peer);
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "could not disable nagle");
        }

        tracing::debug!(%peer, "accepted tcp connection");
        Ok((stream, peer))
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> &Address {
        &self.local
    }
}

/// Opens a TCP connection to `addr`, giving up after `timeout`.
///
/// No retries: a refused or unreachable peer is reported straight away.
pub async fn connect(addr: &Address, timeout: Duration) -> Result<TcpStream, TransportError> {
    check_host(addr)?;
    let stream = match time::timeout(timeout, TcpStream::connect(addr.as_pair())).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(TransportError::ConnectFailed {
                addr: addr.clone(),
                source,
            });
        }
        Err(_elapsed) => {
            return Err(TransportError::ConnectFailed {
                addr: addr.clone(),
                source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            });
        }
    };

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(%addr, error = %e, "could not disable nagle");
    }

    tracing::debug!(%addr, "connected");
    Ok(stream)
}

fn check_host(addr: &Address) -> Result<(), TransportError> {
    if addr.host().is_empty() {
        return Err(TransportError::InvalidAddress(addr.to_string()));
    }
    Ok(())
}
