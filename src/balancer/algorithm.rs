//! Backend selection strategies.

use super::backend::Backend;
use super::pool::Pool;
use std::sync::{Arc, Mutex};

/// A selection strategy over a pool.
///
/// `next` returns `None` only when the pool has no currently healthy
/// backend. Every call consults the live healthy set; nothing is cached
/// across calls.
pub trait Algorithm: Send + Sync {
    /// Select a backend from the pool's healthy set.
    fn next(&self, pool: &Pool) -> Option<Arc<Backend>>;

    /// Get the strategy name.
    fn name(&self) -> &'static str;
}

/// Round-robin selection.
#[derive(Debug, Default)]
pub struct RoundRobin {
    /// Monotone pick counter.
    current: Mutex<u64>,
}

impl RoundRobin {
    /// Create a new round-robin strategy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Algorithm for RoundRobin {
    fn next(&self, pool: &Pool) -> Option<Arc<Backend>> {
        let healthy = pool.healthy();
        if healthy.is_empty() {
            return None;
        }

        let mut current = self.current.lock().expect("round-robin lock poisoned");
        let backend = Arc::clone(&healthy[(*current % healthy.len() as u64) as usize]);
        *current += 1;

        Some(backend)
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}

/// Least-connections selection. Stateless; ties break to pool order.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    /// Create a new least-connections strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Algorithm for LeastConnections {
    fn next(&self, pool: &Pool) -> Option<Arc<Backend>> {
        pool.healthy()
            .into_iter()
            .min_by_key(|b| b.active_connections())
    }

    fn name(&self) -> &'static str {
        "least-connections"
    }
}

/// Cursor and weight counter for weighted round-robin.
#[derive(Debug, Default)]
struct WeightedState {
    cursor: usize,
    weight: u32,
}

/// Weighted round-robin selection.
///
/// The cursor stays on the current backend until its weight is exhausted,
/// so a healthy set `[A(3), B(1)]` yields `A A A B A A A B ...`.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    state: Mutex<WeightedState>,
}

impl WeightedRoundRobin {
    /// Create a new weighted round-robin strategy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Algorithm for WeightedRoundRobin {
    fn next(&self, pool: &Pool) -> Option<Arc<Backend>> {
        let healthy = pool.healthy();
        if healthy.is_empty() {
            return None;
        }

        let mut state = self.state.lock().expect("weighted round-robin lock poisoned");
        let backend = Arc::clone(&healthy[state.cursor % healthy.len()]);

        state.weight += 1;
        if state.weight >= backend.weight() {
            state.weight = 0;
            state.cursor += 1;
        }

        Some(backend)
    }

    fn name(&self) -> &'static str {
        "weighted-round-robin"
    }
}
