//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind both listeners and load TLS material
//! - Wire the registry into the heartbeat listener, health monitor and
//!   request handler
//! - Run everything until a shutdown signal, then drain and close
//!
//! # Design Decisions
//! - Fail fast: a bind or TLS error aborts startup
//! - Listeners are bound in `bind`, so callers know the real addresses
//!   (ephemeral ports included) before traffic starts

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::BalancerConfig;
use crate::error::BalancerError;
use crate::health::{HealthMonitor, HeartbeatListener};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{Dispatcher, Registry};
use crate::net::connection::ConnectionTracker;
use crate::net::{tls, Listener};
use crate::rpc::{RequestHandler, RpcServer};

/// A fully bound load balancer, ready to run.
pub struct Balancer {
    registry: Arc<Registry>,
    heartbeat: HeartbeatListener,
    server: RpcServer,
    monitor: HealthMonitor,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
    shutdown_grace: Duration,
    heartbeat_addr: SocketAddr,
    client_addr: SocketAddr,
}

impl Balancer {
    /// Bind the heartbeat and client listeners described by `config`.
    pub async fn bind(config: BalancerConfig) -> Result<Self, BalancerError> {
        let registry = Arc::new(Registry::new());

        let heartbeat_listener =
            Listener::bind(&config.heartbeat.bind_address, config.heartbeat.max_connections).await?;
        let heartbeat_addr = heartbeat_listener.local_addr()?;

        let client_listener =
            Listener::bind(&config.listener.bind_address, config.listener.max_connections).await?;
        let client_addr = client_listener.local_addr()?;

        let tracker = ConnectionTracker::new();
        let handler = RequestHandler::new(
            Dispatcher::new(Arc::clone(&registry)),
            config.timeouts.clone(),
            config.dispatch.on_dial_failure,
        );
        let mut server = RpcServer::new(client_listener, handler, tracker.clone());

        if let Some(tls_config) = &config.listener.tls {
            let acceptor = tls::load_acceptor(
                Path::new(&tls_config.cert_path),
                Path::new(&tls_config.key_path),
            )?;
            server = server.with_tls(acceptor, config.timeouts.handshake());
            tracing::info!(cert = %tls_config.cert_path, "TLS enabled on client listener");
        } else {
            tracing::warn!("TLS not configured, client listener accepts plaintext");
        }

        tracing::info!(
            heartbeat_address = %heartbeat_addr,
            client_address = %client_addr,
            liveness_timeout_ms = config.health.liveness_timeout_ms,
            on_dial_failure = ?config.dispatch.on_dial_failure,
            "Balancer bound"
        );

        Ok(Self {
            heartbeat: HeartbeatListener::new(heartbeat_listener, Arc::clone(&registry)),
            monitor: HealthMonitor::new(Arc::clone(&registry), &config.health),
            registry,
            server,
            tracker,
            shutdown: Shutdown::new(),
            shutdown_grace: config.lifecycle.shutdown_grace(),
            heartbeat_addr,
            client_addr,
        })
    }

    pub fn heartbeat_addr(&self) -> SocketAddr {
        self.heartbeat_addr
    }

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Serve until `signal` resolves, then shut down gracefully.
    pub async fn run_until<F>(self, signal: F) -> Result<(), BalancerError>
    where
        F: Future<Output = ()>,
    {
        let Balancer {
            registry,
            heartbeat,
            server,
            monitor,
            tracker,
            shutdown,
            shutdown_grace,
            ..
        } = self;

        let heartbeat_task = tokio::spawn(heartbeat.run(shutdown.subscribe()));
        let server_task = tokio::spawn(server.run(shutdown.subscribe()));
        let monitor_task = tokio::spawn(monitor.run(shutdown.subscribe()));

        signal.await;

        tracing::info!("Shutting down: no longer accepting connections");
        shutdown.trigger();

        for (name, task) in [
            ("heartbeat listener", heartbeat_task),
            ("rpc server", server_task),
            ("health monitor", monitor_task),
        ] {
            if let Err(e) = task.await {
                tracing::error!(task = name, error = %e, "Task ended abnormally");
            }
        }

        if tracker.wait_idle(shutdown_grace).await {
            tracing::info!("All in-flight requests completed");
        } else {
            tracing::warn!(
                in_flight = tracker.active_count(),
                grace_ms = shutdown_grace.as_millis() as u64,
                "Grace period elapsed with requests still in flight"
            );
        }

        let closed = registry.close_all();
        tracing::info!(closed_backends = closed, "Shutdown complete");
        Ok(())
    }
}
