//! Heartbeat listener.
//!
//! # Responsibilities
//! - Accept backend connections on the heartbeat address
//! - Decode the stream of heartbeat messages on each connection
//! - Register a backend on its first valid heartbeat, refresh it afterwards

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::load_balancer::{HeartbeatConnection, Registry, Upsert};
use crate::net::listener::{ConnectionPermit, Listener};
use crate::protocol::{read_message, HeartbeatMessage};

/// Accept loop for backend heartbeat connections.
pub struct HeartbeatListener {
    listener: Listener,
    registry: Arc<Registry>,
}

impl HeartbeatListener {
    pub fn new(listener: Listener, registry: Arc<Registry>) -> Self {
        Self { listener, registry }
    }

    /// Accept connections until shutdown is signalled.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            address = ?self.listener.local_addr().ok(),
            "Heartbeat listener started"
        );

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer, permit)) => {
                            let registry = Arc::clone(&self.registry);
                            tokio::spawn(serve_connection(stream, peer, registry, permit));
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to accept heartbeat connection");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Heartbeat listener received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// Drive one backend's heartbeat connection until it fails or is closed by
/// eviction.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<Registry>,
    _permit: ConnectionPermit,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let (connection, mut on_close) = HeartbeatConnection::new(write_half);
    // Handed to the registry by the first valid heartbeat.
    let mut pending = Some(connection);

    tracing::debug!(peer_addr = %peer, "Heartbeat connection opened");

    loop {
        let message = tokio::select! {
            biased;
            _ = &mut on_close => {
                tracing::debug!(peer_addr = %peer, "Heartbeat connection closed by eviction");
                break;
            }
            message = read_message::<HeartbeatMessage, _>(&mut reader) => message,
        };

        let message = match message {
            Ok(message) => message,
            Err(e) if e.is_closed() => {
                tracing::debug!(peer_addr = %peer, "Backend closed heartbeat connection");
                break;
            }
            Err(e) => {
                tracing::warn!(peer_addr = %peer, error = %e, "Failed to decode heartbeat");
                break;
            }
        };

        if !message.is_heartbeat() {
            tracing::warn!(peer_addr = %peer, "Message without heartbeat field ignored");
            continue;
        }

        let port = message.serving_port();
        match registry.upsert(peer, port.as_deref(), &mut pending) {
            Ok(Upsert::Registered(target)) => {
                tracing::info!(
                    heartbeat_address = %target.heartbeat_address,
                    serving_address = %target.serving_address,
                    "Backend joined rotation"
                );
            }
            Ok(Upsert::Refreshed) => {
                tracing::trace!(peer_addr = %peer, "Heartbeat refreshed");
            }
            Err(e) => {
                tracing::error!(peer_addr = %peer, error = %e, "Heartbeat discarded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    async fn start() -> (Arc<Registry>, SocketAddr, broadcast::Sender<()>) {
        let registry = Arc::new(Registry::new());
        let listener = Listener::bind("127.0.0.1:0", 16).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = broadcast::channel(1);
        tokio::spawn(HeartbeatListener::new(listener, Arc::clone(&registry)).run(rx));
        (registry, addr, tx)
    }

    async fn wait_for(registry: &Registry, len: usize) {
        for _ in 0..100 {
            if registry.len() == len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("registry never reached {len} entries (has {})", registry.len());
    }

    #[tokio::test]
    async fn test_first_heartbeat_registers_backend() {
        let (registry, addr, _shutdown) = start().await;

        let mut backend = TcpStream::connect(addr).await.unwrap();
        let local = backend.local_addr().unwrap();
        backend
            .write_all(b"{\"heartbeat\":true,\"port\":\"9001\"}\n")
            .await
            .unwrap();
        wait_for(&registry, 1).await;

        let targets = registry.snapshot();
        assert_eq!(targets[0].heartbeat_address, local);
        assert_eq!(targets[0].serving_address, "127.0.0.1:9001");

        backend.write_all(b"{\"heartbeat\":true}\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_first_heartbeat_without_port_is_discarded() {
        let (registry, addr, _shutdown) = start().await;

        let mut backend = TcpStream::connect(addr).await.unwrap();
        backend.write_all(b"{\"heartbeat\":true}\n").await.unwrap();
        backend.write_all(b"{\"status\":\"ok\"}\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(registry.is_empty());

        // The connection is still served; a valid first heartbeat registers.
        backend
            .write_all(b"{\"heartbeat\":true,\"port\":9002}\n")
            .await
            .unwrap();
        wait_for(&registry, 1).await;
        assert_eq!(registry.snapshot()[0].serving_address, "127.0.0.1:9002");
    }

    #[tokio::test]
    async fn test_malformed_heartbeat_keeps_entry_until_eviction() {
        let (registry, addr, _shutdown) = start().await;

        let mut backend = TcpStream::connect(addr).await.unwrap();
        backend
            .write_all(b"{\"heartbeat\":true,\"port\":\"9003\"}\n")
            .await
            .unwrap();
        wait_for(&registry, 1).await;

        backend.write_all(b"not json\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.len(), 1);

        let evicted = registry.evict_stale(Duration::ZERO);
        assert_eq!(evicted.len(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_eviction_closes_connection() {
        let (registry, addr, _shutdown) = start().await;

        let mut backend = TcpStream::connect(addr).await.unwrap();
        backend
            .write_all(b"{\"heartbeat\":true,\"port\":\"9004\"}\n")
            .await
            .unwrap();
        wait_for(&registry, 1).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        registry.evict_stale(Duration::ZERO);

        let mut buf = [0u8; 1];
        let read = tokio::time::timeout(
            Duration::from_secs(1),
            tokio::io::AsyncReadExt::read(&mut backend, &mut buf),
        )
        .await
        .expect("connection should be closed after eviction");
        assert!(matches!(read, Ok(0) | Err(_)));
    }
}
