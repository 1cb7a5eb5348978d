//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (every read, write and connect has a deadline)
//!     → On dial failure: retries.rs (decide whether to try the next backend)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Only network-level dial failures move on to another backend
//! - Retries are bounded by the registry size at request time

pub mod retries;
pub mod timeouts;

pub use retries::should_retry;
pub use timeouts::{deadline, Elapsed};
