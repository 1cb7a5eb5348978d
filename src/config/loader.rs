//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{BalancerConfig, TlsConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Heartbeat listen address override.
pub const ENV_HEARTBEAT_ADDRESS: &str = "LB_HB_ADDRESS";
/// Client listen address override.
pub const ENV_CLIENT_ADDRESS: &str = "LB_CLIENT_ADDRESS";
/// TLS certificate path override.
pub const ENV_TLS_CERT: &str = "LB_TLS_CERT";
/// TLS private key path override.
pub const ENV_TLS_KEY: &str = "LB_TLS_KEY";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve the effective configuration: the TOML file if given (defaults
/// otherwise), then `LB_*` environment overrides, then validation.
///
/// A `.env` file in the working directory is read first when present.
pub fn load(path: Option<&Path>) -> Result<BalancerConfig, ConfigError> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "Ignoring unreadable .env file");
        }
    }

    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => BalancerConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `LB_*` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut BalancerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(addr) = lookup(ENV_HEARTBEAT_ADDRESS) {
        config.heartbeat.bind_address = addr;
    }
    if let Some(addr) = lookup(ENV_CLIENT_ADDRESS) {
        config.listener.bind_address = addr;
    }

    match (lookup(ENV_TLS_CERT), lookup(ENV_TLS_KEY)) {
        (Some(cert_path), Some(key_path)) => {
            config.listener.tls = Some(TlsConfig { cert_path, key_path });
        }
        (None, None) => {}
        _ => {
            tracing::warn!(
                "Both {} and {} must be set to override TLS material; ignoring",
                ENV_TLS_CERT,
                ENV_TLS_KEY
            );
        }
    }
}
