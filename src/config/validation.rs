//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate bind addresses parse as socket addresses
//! - Validate value ranges (timeouts > 0, connection limits > 0)
//! - Detect conflicting listeners
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::BalancerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let heartbeat_addr = check_address(
        "heartbeat.bind_address",
        &config.heartbeat.bind_address,
        &mut errors,
    );
    let client_addr = check_address(
        "listener.bind_address",
        &config.listener.bind_address,
        &mut errors,
    );

    if let (Some(hb), Some(client)) = (heartbeat_addr, client_addr) {
        if hb == client && hb.port() != 0 {
            errors.push(ValidationError::new(
                "listener.bind_address",
                "must differ from heartbeat.bind_address",
            ));
        }
    }

    if config.heartbeat.max_connections == 0 {
        errors.push(ValidationError::new("heartbeat.max_connections", "must be > 0"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    if config.health.liveness_timeout_ms == 0 {
        errors.push(ValidationError::new("health.liveness_timeout_ms", "must be > 0"));
    }
    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::new("timeouts.connect_ms", "must be > 0"));
    }
    if config.timeouts.io_ms == 0 {
        errors.push(ValidationError::new("timeouts.io_ms", "must be > 0"));
    }
    if config.timeouts.handshake_ms == 0 {
        errors.push(ValidationError::new("timeouts.handshake_ms", "must be > 0"));
    }

    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<SocketAddr> {
    match value.parse::<SocketAddr>() {
        Ok(addr) => Some(addr),
        Err(e) => {
            errors.push(ValidationError::new(field, format!("invalid address '{}': {}", value, e)));
            None
        }
    }
}
