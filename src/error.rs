//! Crate-level error type.
//!
//! Per-connection failures are logged where they happen and never reach
//! this type; it covers what can stop the balancer from starting.

use crate::config::ConfigError;
use crate::net::tls::TlsError;
use crate::net::ListenerError;

#[derive(Debug, thiserror::Error)]
pub enum BalancerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
