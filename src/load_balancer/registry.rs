//! Backend registry with outstanding-request accounting.
//!
//! # Responsibilities
//! - Keep the set of backends in insertion order
//! - Count requests in flight per backend
//! - Optionally track high watermark and lifetime request count
//!
//! The registry itself is not synchronized; the owning
//! [`Balancer`](crate::load_balancer::balancer::Balancer) serializes access.

use std::collections::HashMap;

use crate::load_balancer::backend::BackendId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counters {
    outstanding: usize,
    high_watermark: usize,
    lifetime: u64,
}

/// Ordered set of backends and their counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    keys: Vec<BackendId>,
    counters: HashMap<BackendId, Counters>,
    diagnostics: bool,
}

impl Registry {
    /// Create an empty registry. `diagnostics` enables watermark and lifetime tracking.
    pub fn new(diagnostics: bool) -> Self {
        Self {
            diagnostics,
            ..Self::default()
        }
    }

    /// Insert a backend if absent. Returns `true` when it was inserted.
    pub fn add(&mut self, id: BackendId) -> bool {
        if self.counters.contains_key(&id) {
            return false;
        }
        self.counters.insert(id.clone(), Counters::default());
        self.keys.push(id);
        true
    }

    /// Remove a backend. Returns `true` when it was a member.
    pub fn remove(&mut self, id: &BackendId) -> bool {
        if self.counters.remove(id).is_none() {
            return false;
        }
        self.keys.retain(|k| k != id);
        true
    }

    pub fn contains(&self, id: &BackendId) -> bool {
        self.counters.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn diagnostics(&self) -> bool {
        self.diagnostics
    }

    /// Copy of the ordered key sequence, safe to shuffle.
    pub fn snapshot_keys(&self) -> Vec<BackendId> {
        self.keys.clone()
    }

    /// Record one more request in flight. Returns the new outstanding count,
    /// or `None` if the backend is not registered.
    pub fn acquire(&mut self, id: &BackendId) -> Option<usize> {
        let diagnostics = self.diagnostics;
        let counters = self.counters.get_mut(id)?;
        counters.outstanding += 1;
        if diagnostics {
            counters.high_watermark = counters.high_watermark.max(counters.outstanding);
            counters.lifetime += 1;
        }
        Some(counters.outstanding)
    }

    /// Record one request completed. Must pair with a prior [`acquire`](Self::acquire).
    pub fn release(&mut self, id: &BackendId) -> Option<usize> {
        let counters = self.counters.get_mut(id)?;
        match counters.outstanding.checked_sub(1) {
            Some(n) => counters.outstanding = n,
            None => tracing::warn!(backend = %id, "release without matching acquire"),
        }
        Some(counters.outstanding)
    }

    pub fn outstanding(&self, id: &BackendId) -> Option<usize> {
        self.counters.get(id).map(|c| c.outstanding)
    }

    /// Highest outstanding count observed. `None` unless diagnostics are on.
    pub fn high_watermark(&self, id: &BackendId) -> Option<usize> {
        self.counters
            .get(id)
            .filter(|_| self.diagnostics)
            .map(|c| c.high_watermark)
    }

    /// Requests ever routed to the backend. `None` unless diagnostics are on.
    pub fn lifetime_count(&self, id: &BackendId) -> Option<u64> {
        self.counters
            .get(id)
            .filter(|_| self.diagnostics)
            .map(|c| c.lifetime)
    }

    /// Total requests in flight across all backends.
    pub fn in_flight(&self) -> usize {
        self.counters.values().map(|c| c.outstanding).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> BackendId {
        BackendId::parse(s).unwrap()
    }

    #[test]
    fn test_add_preserves_order_and_is_idempotent() {
        let mut reg = Registry::new(false);
        assert!(reg.add(id("http://a")));
        assert!(reg.add(id("http://b")));
        let once = reg.clone();

        assert!(!reg.add(id("http://A:80/")));
        assert_eq!(reg, once);
        assert_eq!(reg.snapshot_keys(), vec![id("http://a"), id("http://b")]);
    }

    #[test]
    fn test_add_then_remove_restores_state() {
        let mut reg = Registry::new(true);
        reg.add(id("http://a"));
        let before = reg.clone();

        reg.add(id("http://c"));
        assert!(reg.remove(&id("http://c")));
        assert_eq!(reg, before);

        assert!(!reg.remove(&id("http://zzz")));
        assert_eq!(reg, before);
    }

    #[test]
    fn test_acquire_release_counts() {
        let mut reg = Registry::new(false);
        let a = id("http://a");
        reg.add(a.clone());

        assert_eq!(reg.acquire(&a), Some(1));
        assert_eq!(reg.acquire(&a), Some(2));
        assert_eq!(reg.in_flight(), 2);
        assert_eq!(reg.release(&a), Some(1));
        assert_eq!(reg.release(&a), Some(0));
        assert_eq!(reg.outstanding(&a), Some(0));

        // Diagnostics off: no watermark or lifetime.
        assert_eq!(reg.high_watermark(&a), None);
        assert_eq!(reg.lifetime_count(&a), None);
    }

    #[test]
    fn test_diagnostic_counters() {
        let mut reg = Registry::new(true);
        let a = id("http://a");
        reg.add(a.clone());

        reg.acquire(&a);
        reg.acquire(&a);
        reg.acquire(&a);
        reg.release(&a);
        reg.release(&a);
        reg.acquire(&a);

        assert_eq!(reg.outstanding(&a), Some(2));
        assert_eq!(reg.high_watermark(&a), Some(3));
        assert_eq!(reg.lifetime_count(&a), Some(4));
    }

    #[test]
    fn test_unknown_backend() {
        let mut reg = Registry::new(true);
        let ghost = id("http://ghost");
        assert_eq!(reg.acquire(&ghost), None);
        assert_eq!(reg.release(&ghost), None);
        assert_eq!(reg.outstanding(&ghost), None);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut reg = Registry::new(false);
        reg.add(id("http://a"));
        let mut snap = reg.snapshot_keys();
        snap.push(id("http://b"));
        reg.remove(&id("http://a"));
        assert!(reg.is_empty());
        assert_eq!(snap.len(), 2);
    }
}
