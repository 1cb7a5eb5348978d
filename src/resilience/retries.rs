//! Retry decisions for backend dials.
//!
//! # Responsibilities
//! - Decide whether a failed dial moves on to the next backend
//!
//! # Design Decisions
//! - Network failures (refused, reset, timed out) are retried under `Retry`
//! - Malformed backend addresses are never retried
//! - `FailFast` gives up on the first failure

use crate::config::DialFailurePolicy;
use crate::net::DialError;

/// Whether a dial failure should fall through to another backend.
pub fn should_retry(policy: DialFailurePolicy, error: &DialError) -> bool {
    match policy {
        DialFailurePolicy::Retry => error.is_network(),
        DialFailurePolicy::FailFast => false,
    }
}
