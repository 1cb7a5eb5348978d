//! Round-robin dispatcher.
//!
//! # Responsibilities
//! - Hand out the next backend in rotation
//! - Bound a dispatch attempt to the backends registered when it started
//!
//! # Design Decisions
//! - The dispatcher trusts the registry at the instant of selection; a
//!   backend may die between selection and dial, which the request handler
//!   covers by moving on to the next candidate
//! - A candidate walk takes the whole rotation, starting at the cursor, in
//!   one registry call. Other requests advancing the cursor mid-walk cannot
//!   make it repeat a backend or skip one
//! - Backends evicted while the walk is in progress are skipped

use std::sync::Arc;

use crate::load_balancer::{backend::BackendTarget, pool::Registry};

/// Selects backends from the registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Next backend in rotation.
    pub fn next(&self) -> Option<BackendTarget> {
        self.registry.next()
    }

    /// Start a bounded walk over distinct candidates.
    pub fn candidates(&self) -> Candidates<'_> {
        Candidates {
            registry: &self.registry,
            pending: self.registry.rotation().into_iter(),
            attempted: 0,
        }
    }
}

/// Distinct backends for one request: each backend registered when the walk
/// began, at most once.
#[derive(Debug)]
pub struct Candidates<'a> {
    registry: &'a Registry,
    pending: std::vec::IntoIter<BackendTarget>,
    attempted: usize,
}

impl Candidates<'_> {
    /// How many distinct backends have been offered so far.
    pub fn attempted(&self) -> usize {
        self.attempted
    }
}

impl Iterator for Candidates<'_> {
    type Item = BackendTarget;

    fn next(&mut self) -> Option<Self::Item> {
        let target = self
            .pending
            .by_ref()
            .find(|target| self.registry.contains(&target.heartbeat_address))?;
        self.attempted += 1;
        Some(target)
    }
}
