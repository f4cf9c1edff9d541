//! The load balancer: accept loop, dispatch with retry, lifecycle.

use super::algorithm::{Algorithm, RoundRobin};
use super::backend::Backend;
use super::error::{BalancerError, BalancerResult};
use super::health::HealthScheduler;
use super::pool::Pool;
use super::proxy;
use crate::config::BalancerConfig;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Pause after a transient accept error, so a persistent error condition
/// does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Coordinates the pool, the selection strategy, the health scheduler and
/// the per-connection dispatch path.
pub struct LoadBalancer {
    /// Balancer configuration.
    config: BalancerConfig,
    /// The backend pool, shared with the health scheduler and stats.
    pool: Arc<Pool>,
    /// Current selection strategy. Swappable; the swap is a single
    /// reference assignment under the lock.
    algorithm: RwLock<Arc<dyn Algorithm>>,
    /// Shutdown signal for the accept loop and the health scheduler.
    shutdown: broadcast::Sender<()>,
    /// Bound listen address, available once `start` has bound.
    local_addr: RwLock<Option<SocketAddr>>,
}

impl LoadBalancer {
    /// Create a balancer from configuration. The pool is populated with the
    /// configured backends; the default strategy is round-robin. Nothing is
    /// bound until [`start`](Self::start).
    #[must_use]
    pub fn new(config: BalancerConfig) -> Self {
        let pool = Arc::new(Pool::new());
        for entry in &config.backends {
            pool.add(Arc::new(Backend::with_weight(&entry.address, entry.weight)));
        }

        let (shutdown, _) = broadcast::channel(4);

        Self {
            config,
            pool,
            algorithm: RwLock::new(Arc::new(RoundRobin::new())),
            shutdown,
            local_addr: RwLock::new(None),
        }
    }

    /// The backend pool, for stats and health observers.
    #[must_use]
    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    /// Replace the selection strategy.
    pub fn set_algorithm(&self, algorithm: Arc<dyn Algorithm>) {
        info!(algorithm = algorithm.name(), "Selection strategy changed");
        *self.algorithm.write().expect("algorithm lock poisoned") = algorithm;
    }

    /// The bound listen address; `None` until `start` has bound.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().expect("local addr lock poisoned")
    }

    /// Subscribe to the shutdown signal, for collaborators that should
    /// terminate with the balancer.
    #[must_use]
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Bind the listener, launch the health scheduler and run the accept
    /// loop until [`stop`](Self::stop) is called.
    ///
    /// Every accepted client is dispatched on its own task. Transient
    /// accept errors are logged and the loop pauses briefly before
    /// continuing.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start(self: &Arc<Self>) -> BalancerResult<()> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .map_err(|source| BalancerError::Bind {
                address: self.config.listen_addr.clone(),
                source,
            })?;

        let bound = listener.local_addr().map_err(|source| BalancerError::Bind {
            address: self.config.listen_addr.clone(),
            source,
        })?;
        *self.local_addr.write().expect("local addr lock poisoned") = Some(bound);

        info!(
            address = %bound,
            backends = self.pool.size(),
            algorithm = self.algorithm.read().expect("algorithm lock poisoned").name(),
            "Balancer listening"
        );

        let scheduler = HealthScheduler::new(
            Arc::clone(&self.pool),
            self.config.health_check_interval,
            self.config.connect_timeout,
            self.shutdown.subscribe(),
        );
        tokio::spawn(scheduler.run());

        let mut shutdown = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Accept loop shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((client, peer)) => {
                        debug!(peer = %peer, "Accepted connection");

                        let balancer = Arc::clone(self);
                        tokio::spawn(async move {
                            if let Err(e) = balancer.dispatch(client, peer).await {
                                debug!(peer = %peer, error = %e, "Connection dropped");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "Accept error");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }
    }

    /// Signal shutdown: the accept loop returns and the health scheduler
    /// terminates after its current round. In-flight sessions run on until
    /// their peers close.
    pub fn stop(&self) {
        info!("Stopping balancer");
        let _ = self.shutdown.send(());
    }

    /// Dispatch one client: select, dial, hand over to the relay. A failed
    /// dial marks the backend down and moves on to the next selection, up
    /// to one attempt per configured backend.
    async fn dispatch(&self, client: TcpStream, peer: SocketAddr) -> BalancerResult<()> {
        let attempts = self.pool.size();
        let mut last_error = BalancerError::NoHealthyBackend;

        for attempt in 1..=attempts {
            let selected = {
                let algorithm = self.algorithm.read().expect("algorithm lock poisoned");
                algorithm.next(&self.pool)
            };

            let Some(backend) = selected else {
                // Dropping the client closes it without any reply bytes.
                return Err(BalancerError::NoHealthyBackend);
            };

            match backend.dial(self.config.connect_timeout).await {
                Ok(upstream) => {
                    return self.run_session(client, upstream, &backend, peer).await;
                }
                Err(e) => {
                    warn!(
                        peer = %peer,
                        backend = %backend.address(),
                        attempt,
                        error = %e,
                        "Backend dial failed, marking down"
                    );
                    backend.set_alive(false);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    /// Track the session on its backend and relay until either side closes
    /// or the backend is severed out from under it.
    async fn run_session(
        &self,
        client: TcpStream,
        upstream: TcpStream,
        backend: &Arc<Backend>,
        peer: SocketAddr,
    ) -> BalancerResult<()> {
        let mut sever = backend.subscribe_sever();
        let _session = backend.add_connection();

        // The backend may have been marked down between the dial and the
        // registration above; bail out rather than start a doomed session.
        if !backend.is_alive() {
            debug!(peer = %peer, backend = %backend.address(), "Backend went down before session start");
            return Ok(());
        }

        debug!(
            peer = %peer,
            backend = %backend.address(),
            active = backend.active_connections(),
            "Session dispatched"
        );

        tokio::select! {
            result = proxy::relay(client, upstream) => match result {
                Ok((sent, received)) => {
                    debug!(
                        peer = %peer,
                        backend = %backend.address(),
                        bytes_to_backend = sent,
                        bytes_to_client = received,
                        "Session closed"
                    );
                    Ok(())
                }
                Err(e) => {
                    warn!(peer = %peer, backend = %backend.address(), error = %e, "Session ended with IO error");
                    Err(e.into())
                }
            },
            _ = sever.recv() => {
                warn!(peer = %peer, backend = %backend.address(), "Session severed: backend no longer alive");
                Ok(())
            }
        }
    }
}
