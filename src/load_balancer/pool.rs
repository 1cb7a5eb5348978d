//! Backend registry.
//!
//! # Responsibilities
//! - Hold every registered backend, keyed by heartbeat address
//! - Keep the rotation order used for round-robin selection
//! - Apply heartbeats, evictions and selections atomically
//!
//! # Design Decisions
//! - One lock covers the map, the rotation order and the cursor, so the
//!   three can never be observed out of step
//! - Callers only see `BackendTarget` copies, never the map itself
//! - Rotation order is an explicit `Vec`; map iteration order is never used

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::load_balancer::{
    backend::{BackendEntry, BackendTarget, HeartbeatConnection},
    round_robin::RoundRobin,
};
use crate::observability::metrics;

/// Result of applying a heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    /// First valid heartbeat from this address; the backend joined rotation.
    Registered(BackendTarget),
    /// Known backend, timestamp refreshed.
    Refreshed,
}

/// Error type for registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A first heartbeat must announce the serving port.
    #[error("first heartbeat from {0} carried no serving port")]
    MissingPort(SocketAddr),
    /// The connection handle was already handed to the registry.
    #[error("no heartbeat connection available to register {0}")]
    MissingConnection(SocketAddr),
}

#[derive(Debug, Default)]
struct RegistryState {
    entries: HashMap<SocketAddr, BackendEntry>,
    order: Vec<SocketAddr>,
    rotation: RoundRobin,
}

/// In-memory table of live backends.
#[derive(Debug, Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a heartbeat from `address`.
    ///
    /// For an unknown address the entry is created from `port` and the
    /// connection is taken out of `connection`. For a known address only
    /// the timestamp changes; `port` and `connection` are ignored.
    pub fn upsert(
        &self,
        address: SocketAddr,
        port: Option<&str>,
        connection: &mut Option<HeartbeatConnection>,
    ) -> Result<Upsert, RegistryError> {
        let mut state = self.state.lock();

        if let Some(entry) = state.entries.get_mut(&address) {
            entry.refresh();
            return Ok(Upsert::Refreshed);
        }

        let port = port.ok_or(RegistryError::MissingPort(address))?;
        let connection = connection
            .take()
            .ok_or(RegistryError::MissingConnection(address))?;

        let entry = BackendEntry::new(address, port, connection);
        let target = entry.target();
        state.entries.insert(address, entry);
        state.order.push(address);
        metrics::set_registered_backends(state.order.len());

        tracing::debug!(
            heartbeat_address = %address,
            serving_address = %target.serving_address,
            backends = state.order.len(),
            "Backend registered"
        );

        Ok(Upsert::Registered(target))
    }

    /// Remove every backend whose last heartbeat is older than `timeout`,
    /// closing its connection. Remaining backends keep their relative order.
    pub fn evict_stale(&self, timeout: Duration) -> Vec<BackendTarget> {
        let now = Instant::now();
        let mut state = self.state.lock();

        let stale: HashSet<SocketAddr> = state
            .order
            .iter()
            .filter(|addr| {
                state
                    .entries
                    .get(addr)
                    .is_some_and(|entry| entry.is_stale(timeout, now))
            })
            .copied()
            .collect();

        if stale.is_empty() {
            return Vec::new();
        }

        let evicted: Vec<SocketAddr> = state
            .order
            .iter()
            .filter(|addr| stale.contains(addr))
            .copied()
            .collect();
        state.order.retain(|addr| !stale.contains(addr));

        let evicted = evicted
            .into_iter()
            .filter_map(|addr| state.entries.remove(&addr))
            .map(BackendEntry::close)
            .collect();

        metrics::set_registered_backends(state.order.len());
        evicted
    }

    /// Next backend in rotation, or `None` when nothing is registered.
    pub fn next(&self) -> Option<BackendTarget> {
        let mut state = self.state.lock();
        let len = state.order.len();
        let index = state.rotation.next_index(len)?;
        let address = state.order[index];
        state.entries.get(&address).map(BackendEntry::target)
    }

    /// Every registered backend, in rotation order starting at the cursor.
    ///
    /// The cursor advances by one, exactly as for [`Registry::next`], so
    /// concurrent callers still start at successive backends.
    pub fn rotation(&self) -> Vec<BackendTarget> {
        let mut state = self.state.lock();
        let len = state.order.len();
        let Some(start) = state.rotation.next_index(len) else {
            return Vec::new();
        };
        let (head, tail) = state.order.split_at(start);
        tail.iter()
            .chain(head)
            .filter_map(|addr| state.entries.get(addr))
            .map(BackendEntry::target)
            .collect()
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.state.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, address: &SocketAddr) -> bool {
        self.state.lock().entries.contains_key(address)
    }

    /// Registered backends in rotation order.
    pub fn snapshot(&self) -> Vec<BackendTarget> {
        let state = self.state.lock();
        state
            .order
            .iter()
            .filter_map(|addr| state.entries.get(addr))
            .map(BackendEntry::target)
            .collect()
    }

    /// Close every heartbeat connection and empty the registry.
    pub fn close_all(&self) -> usize {
        let mut state = self.state.lock();
        let order = std::mem::take(&mut state.order);
        let closed = order
            .iter()
            .filter_map(|addr| state.entries.remove(addr))
            .map(BackendEntry::close)
            .count();
        state.entries.clear();
        metrics::set_registered_backends(0);
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::testing::loopback_connection;
    use tokio::sync::oneshot;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    async fn register(registry: &Registry, address: SocketAddr, port: &str) -> oneshot::Receiver<()> {
        let (connection, on_close, _peer) = loopback_connection().await;
        let mut slot = Some(connection);
        let outcome = registry.upsert(address, Some(port), &mut slot).unwrap();
        assert!(matches!(outcome, Upsert::Registered(_)));
        assert!(slot.is_none());
        on_close
    }

    #[tokio::test]
    async fn test_one_entry_per_heartbeat_address() {
        let registry = Registry::new();
        let _a = register(&registry, addr(50001), "9001").await;
        let _b = register(&registry, addr(50002), "9002").await;

        // Later heartbeats carry no port and no connection.
        for _ in 0..3 {
            let outcome = registry.upsert(addr(50001), None, &mut None).unwrap();
            assert_eq!(outcome, Upsert::Refreshed);
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].serving_address, "127.0.0.1:9001");
        assert_eq!(snapshot[1].serving_address, "127.0.0.1:9002");
    }

    #[tokio::test]
    async fn test_serving_address_fixed_at_creation() {
        let registry = Registry::new();
        let _a = register(&registry, addr(50003), "9001").await;

        let outcome = registry.upsert(addr(50003), Some("9999"), &mut None).unwrap();
        assert_eq!(outcome, Upsert::Refreshed);
        assert_eq!(registry.snapshot()[0].serving_address, "127.0.0.1:9001");
    }

    #[tokio::test]
    async fn test_first_heartbeat_without_port_is_rejected() {
        let registry = Registry::new();
        let (connection, _on_close, _peer) = loopback_connection().await;
        let mut slot = Some(connection);

        let err = registry.upsert(addr(50004), None, &mut slot).unwrap_err();
        assert_eq!(err, RegistryError::MissingPort(addr(50004)));
        assert!(slot.is_some(), "connection stays with the caller");
        assert!(registry.is_empty());

        // A valid first heartbeat later still registers the sender.
        let outcome = registry.upsert(addr(50004), Some("9004"), &mut slot).unwrap();
        assert!(matches!(outcome, Upsert::Registered(_)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_round_robin_in_insertion_order() {
        let registry = Registry::new();
        let _a = register(&registry, addr(50011), "9001").await;
        let _b = register(&registry, addr(50012), "9002").await;
        let _c = register(&registry, addr(50013), "9003").await;

        let picks: Vec<_> = (0..6)
            .map(|_| registry.next().unwrap().serving_address)
            .collect();
        assert_eq!(
            picks,
            vec![
                "127.0.0.1:9001",
                "127.0.0.1:9002",
                "127.0.0.1:9003",
                "127.0.0.1:9001",
                "127.0.0.1:9002",
                "127.0.0.1:9003",
            ]
        );
    }

    #[test]
    fn test_next_on_empty_registry() {
        let registry = Registry::new();
        assert_eq!(registry.next(), None);
        assert!(registry.rotation().is_empty());
    }

    #[tokio::test]
    async fn test_rotation_starts_at_cursor_and_advances_once() {
        let registry = Registry::new();
        let _a = register(&registry, addr(50061), "9001").await;
        let _b = register(&registry, addr(50062), "9002").await;
        let _c = register(&registry, addr(50063), "9003").await;

        registry.next();
        let order: Vec<_> = registry
            .rotation()
            .into_iter()
            .map(|t| t.serving_address)
            .collect();
        assert_eq!(order, vec!["127.0.0.1:9002", "127.0.0.1:9003", "127.0.0.1:9001"]);

        assert_eq!(registry.next().unwrap().serving_address, "127.0.0.1:9003");
    }

    #[tokio::test]
    async fn test_evicts_only_stale_entries() {
        let registry = Registry::new();
        let on_close_a = register(&registry, addr(50021), "9001").await;
        let _b = register(&registry, addr(50022), "9002").await;
        let _c = register(&registry, addr(50023), "9003").await;
        let timeout = Duration::from_millis(1_200);

        tokio::time::pause();
        tokio::time::advance(Duration::from_millis(800)).await;
        registry.upsert(addr(50022), None, &mut None).unwrap();
        registry.upsert(addr(50023), None, &mut None).unwrap();

        tokio::time::advance(Duration::from_millis(600)).await;
        let evicted = registry.evict_stale(timeout);

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].heartbeat_address, addr(50021));
        assert!(!registry.contains(&addr(50021)));
        assert!(on_close_a.await.is_ok(), "evicted connection is closed");

        let remaining: Vec<_> = registry
            .snapshot()
            .into_iter()
            .map(|t| t.heartbeat_address)
            .collect();
        assert_eq!(remaining, vec![addr(50022), addr(50023)]);
    }

    #[tokio::test]
    async fn test_no_eviction_within_timeout() {
        let registry = Registry::new();
        let _a = register(&registry, addr(50031), "9001").await;

        tokio::time::pause();
        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert!(registry.evict_stale(Duration::from_millis(1_200)).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_cursor_wraps_after_eviction() {
        let registry = Registry::new();
        let _a = register(&registry, addr(50041), "9001").await;
        let _b = register(&registry, addr(50042), "9002").await;
        let _c = register(&registry, addr(50043), "9003").await;

        tokio::time::pause();
        // Advance the cursor to the last slot.
        registry.next();
        registry.next();

        tokio::time::advance(Duration::from_millis(500)).await;
        registry.upsert(addr(50041), None, &mut None).unwrap();
        tokio::time::advance(Duration::from_millis(1_000)).await;
        let evicted = registry.evict_stale(Duration::from_millis(1_200));
        assert_eq!(evicted.len(), 2);

        // Cursor (2) is past the single remaining entry.
        let next = registry.next().unwrap();
        assert_eq!(next.heartbeat_address, addr(50041));
        assert_eq!(registry.next().unwrap().heartbeat_address, addr(50041));
    }

    #[tokio::test]
    async fn test_close_all_empties_registry() {
        let registry = Registry::new();
        let on_close = register(&registry, addr(50051), "9001").await;
        let _b = register(&registry, addr(50052), "9002").await;

        assert_eq!(registry.close_all(), 2);
        assert!(registry.is_empty());
        assert_eq!(registry.next(), None);
        assert!(on_close.await.is_ok());
    }
}
