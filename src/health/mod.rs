//! Health subsystem.
//!
//! # Data Flow
//! ```text
//! Heartbeat listener (heartbeat.rs):
//!     Backend opens a persistent connection
//!     → One task per connection decodes heartbeat messages
//!     → Registry::upsert (register or refresh)
//!
//! Health monitor (monitor.rs):
//!     Periodic timer (period = liveness timeout)
//!     → Registry::evict_stale
//!     → Evicted connections closed, reader tasks stop
//! ```
//!
//! # Design Decisions
//! - Liveness is derived from the last heartbeat timestamp only
//! - One eviction path: a dead reader does not remove its entry, the
//!   monitor does once the timestamp goes stale
//! - The balancer never writes to heartbeat connections

pub mod heartbeat;
pub mod monitor;

pub use heartbeat::HeartbeatListener;
pub use monitor::HealthMonitor;
