//! Liveness monitor.
//!
//! # Responsibilities
//! - Periodically sweep the registry for stale backends
//! - Evict them, which closes their heartbeat connections

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthConfig;
use crate::load_balancer::{BackendTarget, Registry};
use crate::observability::metrics;

pub struct HealthMonitor {
    registry: Arc<Registry>,
    timeout: Duration,
}

impl HealthMonitor {
    pub fn new(registry: Arc<Registry>, config: &HealthConfig) -> Self {
        Self {
            registry,
            timeout: config.liveness_timeout(),
        }
    }

    /// Sweep once per liveness timeout until shutdown is signalled.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            timeout_ms = self.timeout.as_millis() as u64,
            "Health monitor starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.timeout, self.timeout);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Evict every backend that missed its liveness window.
    pub fn sweep(&self) -> Vec<BackendTarget> {
        let evicted = self.registry.evict_stale(self.timeout);
        for target in &evicted {
            metrics::record_eviction();
            tracing::warn!(
                heartbeat_address = %target.heartbeat_address,
                serving_address = %target.serving_address,
                "Backend evicted: heartbeat timed out"
            );
        }
        if !evicted.is_empty() {
            tracing::info!(
                evicted = evicted.len(),
                remaining = self.registry.len(),
                "Liveness sweep complete"
            );
        }
        evicted
    }
}
