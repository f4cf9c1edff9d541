//! Periodic active health checking.

use super::pool::Pool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::debug;

/// Scheduler that probes every backend at a fixed interval.
///
/// Each tick snapshots the pool and probes all backends concurrently,
/// waiting for the whole round before the next tick so a slow probe can
/// delay the cycle by at most the connect timeout.
pub struct HealthScheduler {
    pool: Arc<Pool>,
    interval: Duration,
    connect_timeout: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl HealthScheduler {
    /// Create a new scheduler.
    #[must_use]
    pub fn new(
        pool: Arc<Pool>,
        interval: Duration,
        connect_timeout: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            pool,
            interval,
            connect_timeout,
            shutdown,
        }
    }

    /// Run until the shutdown signal fires.
    pub async fn run(mut self) {
        debug!(
            interval_secs = self.interval.as_secs(),
            "Health scheduler started"
        );

        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    debug!("Health scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.check_all().await;
                }
            }
        }
    }

    /// Probe every backend in the pool, one task each, and join the round.
    async fn check_all(&self) {
        let backends = self.pool.all();
        let connect_timeout = self.connect_timeout;

        let mut probes = JoinSet::new();
        for backend in backends {
            probes.spawn(async move {
                backend.check_health(connect_timeout).await;
            });
        }

        while probes.join_next().await.is_some() {}

        debug!(
            healthy = self.pool.healthy_count(),
            total = self.pool.size(),
            "Health check round complete"
        );
    }
}
