//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Heartbeat arrives
//!     → pool.rs (Registry::upsert: create entry or refresh timestamp)
//!
//! Health sweep
//!     → pool.rs (Registry::evict_stale: close + remove stale entries)
//!
//! Client request
//!     → dispatcher.rs (bounded candidate walk)
//!     → pool.rs (Registry::next under the registry lock)
//!     → round_robin.rs (cursor over the rotation order)
//!     → backend.rs (BackendTarget handed to the request handler)
//! ```
//!
//! # Design Decisions
//! - The registry is the only shared mutable state; one lock guards it
//! - Absence from the registry is the unhealthy signal
//! - Strict round robin over insertion order, no weighting

pub mod backend;
pub mod dispatcher;
pub mod pool;
pub mod round_robin;

pub use backend::{BackendEntry, BackendTarget, HeartbeatConnection};
pub use dispatcher::{Candidates, Dispatcher};
pub use pool::{Registry, RegistryError, Upsert};
