//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single registered backend server
//! - Own the backend's heartbeat connection until eviction
//! - Derive liveness from the last heartbeat timestamp

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Owned handle to a backend's heartbeat connection.
///
/// The heartbeat task keeps the read half and waits on the paired
/// receiver; the registry keeps this half. [`HeartbeatConnection::close`]
/// consumes the handle, so a connection is closed at most once.
#[derive(Debug)]
pub struct HeartbeatConnection {
    writer: OwnedWriteHalf,
    closed: oneshot::Sender<()>,
}

impl HeartbeatConnection {
    /// Wrap the write half. The returned receiver fires when the
    /// connection is closed (or the handle is dropped).
    pub fn new(writer: OwnedWriteHalf) -> (Self, oneshot::Receiver<()>) {
        let (closed, on_close) = oneshot::channel();
        (Self { writer, closed }, on_close)
    }

    /// Close the connection: tell the reader to stop and shut down the
    /// write side.
    pub fn close(self) {
        let _ = self.closed.send(());
        drop(self.writer);
    }
}

/// Where to find a backend, as handed out by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendTarget {
    /// Registry key: remote address of the heartbeat connection.
    pub heartbeat_address: SocketAddr,
    /// `host:port` accepting RPC traffic.
    pub serving_address: String,
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (heartbeat {})", self.serving_address, self.heartbeat_address)
    }
}

/// A single registered backend.
#[derive(Debug)]
pub struct BackendEntry {
    heartbeat_address: SocketAddr,
    serving_address: String,
    last_heartbeat: Instant,
    connection: HeartbeatConnection,
}

impl BackendEntry {
    /// Create an entry from its first heartbeat.
    pub fn new(heartbeat_address: SocketAddr, port: &str, connection: HeartbeatConnection) -> Self {
        Self {
            heartbeat_address,
            serving_address: serving_address(heartbeat_address, port),
            last_heartbeat: Instant::now(),
            connection,
        }
    }

    /// Record a heartbeat.
    pub fn refresh(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    /// True once more than `timeout` has passed since the last heartbeat.
    pub fn is_stale(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_heartbeat) > timeout
    }

    pub fn target(&self) -> BackendTarget {
        BackendTarget {
            heartbeat_address: self.heartbeat_address,
            serving_address: self.serving_address.clone(),
        }
    }

    /// Tear the entry down, closing its heartbeat connection.
    pub fn close(self) -> BackendTarget {
        let target = self.target();
        self.connection.close();
        target
    }
}

/// Peer host of the heartbeat connection joined with the announced port.
pub fn serving_address(peer: SocketAddr, port: &str) -> String {
    match peer {
        SocketAddr::V4(v4) => format!("{}:{}", v4.ip(), port),
        SocketAddr::V6(v6) => format!("[{}]:{}", v6.ip(), port),
    }
}
