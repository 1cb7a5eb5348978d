//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Bind heartbeat listener → Bind client listener (+TLS)
//!     → Spawn heartbeat listener, RPC server, health monitor
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests (bounded)
//!     → Close heartbeat connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Failing to bind either listener is fatal, nothing else is
//! - Shutdown has a grace period; in-flight relays get that long to finish
//! - Nothing is persisted: the registry starts empty on every run

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::Balancer;
