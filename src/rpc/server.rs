//! Client-facing accept loop.
//!
//! # Responsibilities
//! - Accept client connections on the RPC address
//! - Run the TLS handshake when TLS is configured
//! - Spawn one request handler per connection and track it for shutdown

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;

use crate::net::connection::ConnectionTracker;
use crate::net::listener::{ConnectionPermit, Listener};
use crate::rpc::handler::RequestHandler;

/// Accept loop for client RPC connections.
pub struct RpcServer {
    listener: Listener,
    handler: RequestHandler,
    tls: Option<TlsAcceptor>,
    handshake_timeout: Duration,
    tracker: ConnectionTracker,
}

impl RpcServer {
    pub fn new(listener: Listener, handler: RequestHandler, tracker: ConnectionTracker) -> Self {
        Self {
            listener,
            handler,
            tls: None,
            handshake_timeout: Duration::from_secs(5),
            tracker,
        }
    }

    /// Require a TLS handshake on every connection.
    pub fn with_tls(mut self, acceptor: TlsAcceptor, handshake_timeout: Duration) -> Self {
        self.tls = Some(acceptor);
        self.handshake_timeout = handshake_timeout;
        self
    }

    /// Accept connections until shutdown is signalled. In-flight handlers
    /// keep running; use the tracker to wait for them.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            address = ?self.listener.local_addr().ok(),
            tls = self.tls.is_some(),
            "RPC server started"
        );

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer, permit)) => self.spawn_connection(stream, peer, permit),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to accept client connection");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(
                        in_flight = self.tracker.active_count(),
                        "RPC server received shutdown signal, exiting loop"
                    );
                    break;
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let in_flight = self.tracker.track();
        let connection = in_flight.sequence();
        let handler = self.handler.clone();
        let tls = self.tls.clone();
        let handshake_timeout = self.handshake_timeout;

        tokio::spawn(async move {
            let _permit = permit;
            let _in_flight = in_flight;

            match tls {
                Some(acceptor) => {
                    match tokio::time::timeout(handshake_timeout, acceptor.accept(stream)).await {
                        Ok(Ok(tls_stream)) => handler.handle(tls_stream, peer, connection).await,
                        Ok(Err(e)) => {
                            tracing::warn!(peer_addr = %peer, connection, error = %e, "TLS handshake failed");
                        }
                        Err(_) => {
                            tracing::warn!(peer_addr = %peer, connection, "TLS handshake timed out");
                        }
                    }
                }
                None => handler.handle(stream, peer, connection).await,
            }
        });
    }
}
