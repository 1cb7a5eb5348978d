//! In-flight client connections.
//!
//! # Responsibilities
//! - Number client connections in accept order, for the request span
//! - Count the ones still being served so shutdown can drain them

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    accepted: AtomicU64,
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Shared count of client connections still being served.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    inner: Arc<Inner>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted connection. It stays in flight until the
    /// returned guard is dropped.
    pub fn track(&self) -> InFlight {
        let sequence = self.inner.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight {
            inner: Arc::clone(&self.inner),
            sequence,
        }
    }

    pub fn active_count(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Wait for every in-flight connection to finish, at most `grace`.
    ///
    /// Returns `true` if nothing was left in flight.
    pub async fn wait_idle(&self, grace: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.inner.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.active_count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(grace, drained).await.is_ok()
    }
}

/// One connection being served.
#[derive(Debug)]
pub struct InFlight {
    inner: Arc<Inner>,
    sequence: u64,
}

impl InFlight {
    /// Position of this connection in accept order, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
