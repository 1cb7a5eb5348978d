//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_requests_total` (counter): client requests by outcome
//! - `balancer_request_duration_seconds` (histogram): end-to-end latency
//! - `balancer_dispatch_attempts_total` (counter): backend dials by result
//! - `balancer_backends_registered` (gauge): current registry size
//! - `balancer_backends_evicted_total` (counter): liveness evictions
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished client request.
pub fn record_request(outcome: &'static str, start: Instant) {
    counter!("balancer_requests_total", "outcome" => outcome).increment(1);
    histogram!("balancer_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record one backend dial attempt.
pub fn record_dispatch_attempt(result: &'static str) {
    counter!("balancer_dispatch_attempts_total", "result" => result).increment(1);
}

/// Publish the registry size.
pub fn set_registered_backends(count: usize) {
    gauge!("balancer_backends_registered").set(count as f64);
}

/// Count one liveness eviction.
pub fn record_eviction() {
    counter!("balancer_backends_evicted_total").increment(1);
}
