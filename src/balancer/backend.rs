//! Backend state management: liveness, session tracking, dialing, probing.

use super::error::{BalancerError, BalancerResult};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Notify};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Mutable backend state, guarded by one lock.
#[derive(Debug)]
struct BackendState {
    /// Whether the backend is currently considered healthy.
    alive: bool,
    /// Failure-injection override. While set, dials fail fast and probes
    /// cannot bring `alive` back up.
    simulated_down: bool,
    /// Ids of currently dispatched sessions.
    sessions: HashSet<u64>,
    /// Total sessions ever dispatched to this backend.
    total_connections: u64,
    /// Next session id to mint.
    next_session_id: u64,
    /// Completion time of the most recent probe.
    last_health_check: Instant,
}

/// A single upstream target.
///
/// The dispatch path mutates session tracking, the health checker mutates
/// liveness, and the simulator toggles the failure override. All of it goes
/// through the one internal lock; no lock is held across I/O.
#[derive(Debug)]
pub struct Backend {
    /// Backend address in `host:port` form.
    address: String,
    /// Weight for weighted selection.
    weight: u32,
    /// Guarded mutable state.
    state: RwLock<BackendState>,
    /// Signalled when `alive` transitions back to true.
    recovered: Notify,
    /// Fired on every `alive` true-to-false transition; active sessions
    /// subscribe and terminate when it fires.
    sever: broadcast::Sender<()>,
}

impl Backend {
    /// Create a new backend with weight 1.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_weight(address, 1)
    }

    /// Create a new backend with a custom weight.
    #[must_use]
    pub fn with_weight(address: impl Into<String>, weight: u32) -> Self {
        let (sever, _) = broadcast::channel(4);
        Self {
            address: address.into(),
            weight,
            state: RwLock::new(BackendState {
                alive: true,
                simulated_down: false,
                sessions: HashSet::new(),
                total_connections: 0,
                next_session_id: 0,
                last_health_check: Instant::now(),
            }),
            recovered: Notify::new(),
            sever,
        }
    }

    /// Get the backend address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Get the backend weight.
    #[must_use]
    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Whether the backend is currently considered healthy.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state.read().expect("backend lock poisoned").alive
    }

    /// Whether the failure override is set.
    #[must_use]
    pub fn is_simulated_down(&self) -> bool {
        self.state
            .read()
            .expect("backend lock poisoned")
            .simulated_down
    }

    /// Set the liveness flag.
    ///
    /// Going down releases every tracked session (subscribers of the sever
    /// channel terminate and drop their sockets) and empties the session
    /// set. Coming back up wakes any parked waiters.
    pub fn set_alive(&self, alive: bool) {
        let went_down = {
            let mut state = self.state.write().expect("backend lock poisoned");
            let went_down = state.alive && !alive;
            state.alive = alive;
            if went_down {
                state.sessions.clear();
            }
            went_down
        };

        if went_down {
            debug!(backend = %self.address, "Backend marked down, severing sessions");
            let _ = self.sever.send(());
        } else if alive {
            self.recovered.notify_waiters();
        }
    }

    /// Toggle the failure-injection override.
    ///
    /// Going down severs tracked sessions but leaves `alive` untouched: the
    /// dispatch path discovers the outage when its dial fails. Recovery only
    /// clears the flag; a successful active probe restores `alive`.
    pub fn set_simulated_down(&self, down: bool) {
        {
            let mut state = self.state.write().expect("backend lock poisoned");
            state.simulated_down = down;
            if down {
                state.sessions.clear();
            }
        }

        if down {
            debug!(backend = %self.address, "Failure injected, severing sessions");
            let _ = self.sever.send(());
        } else {
            self.recovered.notify_waiters();
        }
    }

    /// Track a new dispatched session and bump the total counter.
    ///
    /// The returned guard removes the session when dropped.
    #[must_use]
    pub fn add_connection(self: &Arc<Self>) -> SessionGuard {
        let id = {
            let mut state = self.state.write().expect("backend lock poisoned");
            let id = state.next_session_id;
            state.next_session_id += 1;
            state.sessions.insert(id);
            state.total_connections += 1;
            id
        };

        SessionGuard {
            backend: Arc::clone(self),
            id,
        }
    }

    /// Stop tracking a session. A no-op if the session is not tracked
    /// (it may already have been severed).
    pub fn remove_connection(&self, id: u64) {
        self.state
            .write()
            .expect("backend lock poisoned")
            .sessions
            .remove(&id);
    }

    /// Number of currently tracked sessions.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.state
            .read()
            .expect("backend lock poisoned")
            .sessions
            .len()
    }

    /// Total sessions ever dispatched to this backend.
    #[must_use]
    pub fn total_connections(&self) -> u64 {
        self.state
            .read()
            .expect("backend lock poisoned")
            .total_connections
    }

    /// Completion time of the most recent health probe.
    #[must_use]
    pub fn last_health_check(&self) -> Instant {
        self.state
            .read()
            .expect("backend lock poisoned")
            .last_health_check
    }

    /// Snapshot of the backend's statistics, taken under one read lock.
    #[must_use]
    pub fn stats(&self) -> BackendSnapshot {
        let state = self.state.read().expect("backend lock poisoned");
        BackendSnapshot {
            address: self.address.clone(),
            alive: state.alive,
            active_connections: state.sessions.len(),
            total_connections: state.total_connections,
        }
    }

    /// Subscribe to the sever signal for the next session.
    #[must_use]
    pub fn subscribe_sever(&self) -> broadcast::Receiver<()> {
        self.sever.subscribe()
    }

    /// Connect to the backend, bounded by `connect_timeout`.
    ///
    /// # Errors
    ///
    /// Fails fast with [`BalancerError::BackendDown`] while the failure
    /// override is set; otherwise maps connect errors and timeouts.
    pub async fn dial(&self, connect_timeout: Duration) -> BalancerResult<TcpStream> {
        if self.is_simulated_down() {
            return Err(BalancerError::BackendDown(self.address.clone()));
        }

        match timeout(connect_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(BalancerError::Dial {
                address: self.address.clone(),
                source,
            }),
            Err(_) => Err(BalancerError::DialTimeout {
                address: self.address.clone(),
            }),
        }
    }

    /// Probe the backend and set `alive` to the outcome.
    ///
    /// The probe goes through [`dial`](Self::dial), so a simulated-down
    /// backend always fails it. Stamps `last_health_check` either way.
    pub async fn check_health(&self, connect_timeout: Duration) -> bool {
        let healthy = match self.dial(connect_timeout).await {
            Ok(stream) => {
                drop(stream);
                true
            }
            Err(e) => {
                warn!(backend = %self.address, error = %e, "Health probe failed");
                false
            }
        };

        self.state
            .write()
            .expect("backend lock poisoned")
            .last_health_check = Instant::now();

        self.set_alive(healthy);
        healthy
    }

    /// Wait until the backend reads alive. Used by the demo echo server to
    /// park its acceptor while the backend is down.
    pub async fn wait_until_alive(&self) {
        loop {
            let notified = self.recovered.notified();
            if self.is_alive() {
                return;
            }
            notified.await;
        }
    }
}

/// Owned snapshot of a backend's statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSnapshot {
    /// Backend address.
    pub address: String,
    /// Liveness at snapshot time.
    pub alive: bool,
    /// Sessions tracked at snapshot time.
    pub active_connections: usize,
    /// Sessions ever dispatched.
    pub total_connections: u64,
}

/// RAII guard for a tracked session; untracks on drop.
#[derive(Debug)]
pub struct SessionGuard {
    backend: Arc<Backend>,
    id: u64,
}

impl SessionGuard {
    /// The backend this session is dispatched to.
    #[must_use]
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.backend.remove_connection(self.id);
    }
}
