//! Outbound connections to backends.

use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;

/// Why a backend could not be reached.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    /// The serving address is not a valid socket address.
    #[error("invalid backend address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: AddrParseError,
    },
    /// The TCP connect failed (refused, reset, unreachable, ...).
    #[error("connection to {address} failed: {source}")]
    Connect {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// The TCP connect did not finish in time.
    #[error("connection to {address} timed out after {limit:?}")]
    Timeout { address: SocketAddr, limit: Duration },
}

impl DialError {
    /// A network-level failure: the backend is probably down but not yet
    /// evicted. Address errors are not network failures.
    pub fn is_network(&self) -> bool {
        matches!(self, DialError::Connect { .. } | DialError::Timeout { .. })
    }
}

/// Connect to `address` (`ip:port`) within `limit`.
pub async fn dial(address: &str, limit: Duration) -> Result<TcpStream, DialError> {
    let addr: SocketAddr = address.parse().map_err(|source| DialError::InvalidAddress {
        address: address.to_string(),
        source,
    })?;

    match tokio::time::timeout(limit, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(address = %addr, error = %e, "Failed to set TCP_NODELAY");
            }
            Ok(stream)
        }
        Ok(Err(source)) => Err(DialError::Connect { address: addr, source }),
        Err(_) => Err(DialError::Timeout { address: addr, limit }),
    }
}
