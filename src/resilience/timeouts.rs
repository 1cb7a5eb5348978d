//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap client and backend I/O with a deadline
//! - Report which operation ran out of time

use std::future::Future;
use std::time::Duration;

/// An operation did not finish within its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{operation} timed out after {limit:?}")]
pub struct Elapsed {
    pub operation: &'static str,
    pub limit: Duration,
}

/// Run `fut` to completion or fail with [`Elapsed`] after `limit`.
pub async fn deadline<F>(operation: &'static str, limit: Duration, fut: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        tracing::debug!(operation, limit_ms = limit.as_millis() as u64, "Deadline exceeded");
        Elapsed { operation, limit }
    })
}
