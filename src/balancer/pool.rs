//! Backend pool: the ordered, shared collection the selectors draw from.

use super::backend::{Backend, BackendSnapshot};
use std::sync::{Arc, RwLock};

/// Thread-safe, ordered collection of backends.
///
/// Iteration order is insertion order for the lifetime of the pool; the
/// selection strategies rely on it for fairness and tie-breaking. The pool
/// never mutates backend state.
#[derive(Debug, Default)]
pub struct Pool {
    backends: RwLock<Vec<Arc<Backend>>>,
}

impl Pool {
    /// Create a new empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a backend to the pool.
    pub fn add(&self, backend: Arc<Backend>) {
        self.backends
            .write()
            .expect("pool lock poisoned")
            .push(backend);
    }

    /// Remove the first backend with the given address. Returns whether a
    /// backend was removed.
    pub fn remove(&self, address: &str) -> bool {
        let mut backends = self.backends.write().expect("pool lock poisoned");
        if let Some(pos) = backends.iter().position(|b| b.address() == address) {
            backends.remove(pos);
            true
        } else {
            false
        }
    }

    /// A copy of all backend references, in pool order.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<Backend>> {
        self.backends.read().expect("pool lock poisoned").clone()
    }

    /// The backends whose liveness reads true right now, in pool order.
    #[must_use]
    pub fn healthy(&self) -> Vec<Arc<Backend>> {
        self.backends
            .read()
            .expect("pool lock poisoned")
            .iter()
            .filter(|b| b.is_alive())
            .cloned()
            .collect()
    }

    /// Find a backend by address.
    #[must_use]
    pub fn lookup(&self, address: &str) -> Option<Arc<Backend>> {
        self.backends
            .read()
            .expect("pool lock poisoned")
            .iter()
            .find(|b| b.address() == address)
            .cloned()
    }

    /// Total number of backends.
    #[must_use]
    pub fn size(&self) -> usize {
        self.backends.read().expect("pool lock poisoned").len()
    }

    /// Number of currently healthy backends.
    #[must_use]
    pub fn healthy_count(&self) -> usize {
        self.backends
            .read()
            .expect("pool lock poisoned")
            .iter()
            .filter(|b| b.is_alive())
            .count()
    }

    /// Statistics snapshots for every backend, in pool order.
    #[must_use]
    pub fn all_stats(&self) -> Vec<BackendSnapshot> {
        self.backends
            .read()
            .expect("pool lock poisoned")
            .iter()
            .map(|b| b.stats())
            .collect()
    }
}
