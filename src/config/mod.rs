//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env (optional, dotenvy)
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, apply LB_* overrides)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → cloned into each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is read once at process start and never reloaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::BalancerConfig;
pub use schema::DialFailurePolicy;
pub use schema::ListenerConfig;
pub use schema::TlsConfig;
pub use schema::HealthConfig;
pub use schema::TimeoutConfig;
