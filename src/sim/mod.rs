//! # Failure Simulator
//!
//! Demo collaborator that injects outages: it periodically picks a random
//! backend, holds it down for a while via the simulated-down override, then
//! lets the active health checker rediscover it.

use crate::balancer::Pool;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// An event emitted by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// A backend was taken down.
    BackendDown(String),
    /// A backend was brought back.
    BackendRecovered(String),
}

/// Periodic random failure/recovery driver.
pub struct FailureSimulator {
    /// The pool to pick victims from.
    pool: Arc<Pool>,
    /// Delay before the first outage.
    initial_delay: Duration,
    /// Shortest outage.
    outage_min: Duration,
    /// Longest outage.
    outage_max: Duration,
    /// Quiet period between recovery and the next outage.
    recovery_gap: Duration,
    /// Event channel for observers.
    events: broadcast::Sender<SimEvent>,
    /// Shutdown signal.
    shutdown: broadcast::Receiver<()>,
}

impl FailureSimulator {
    /// Create a simulator with the demo timing: first outage after 5 s,
    /// outages of 15–20 s, 25 s between cycles.
    #[must_use]
    pub fn new(pool: Arc<Pool>, shutdown: broadcast::Receiver<()>) -> Self {
        Self::with_timing(
            pool,
            shutdown,
            Duration::from_secs(5),
            Duration::from_secs(15),
            Duration::from_secs(20),
            Duration::from_secs(25),
        )
    }

    /// Create a simulator with custom timing.
    #[must_use]
    pub fn with_timing(
        pool: Arc<Pool>,
        shutdown: broadcast::Receiver<()>,
        initial_delay: Duration,
        outage_min: Duration,
        outage_max: Duration,
        recovery_gap: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            pool,
            initial_delay,
            outage_min,
            outage_max,
            recovery_gap,
            events,
            shutdown,
        }
    }

    /// Subscribe to simulator events. Call before [`run`](Self::run).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.events.subscribe()
    }

    /// Run failure cycles until the shutdown signal fires. A backend held
    /// down when shutdown arrives is recovered on the way out.
    pub async fn run(mut self) {
        info!("Failure simulator started");

        if !self.pause(self.initial_delay).await {
            return;
        }

        loop {
            let backends = self.pool.all();
            if backends.is_empty() {
                if !self.pause(self.recovery_gap).await {
                    return;
                }
                continue;
            }

            let (victim, outage) = {
                let mut rng = rand::rng();
                let victim = Arc::clone(&backends[rng.random_range(0..backends.len())]);
                let jitter_ms = (self.outage_max - self.outage_min).as_millis() as u64;
                let outage = self.outage_min + Duration::from_millis(rng.random_range(0..=jitter_ms));
                (victim, outage)
            };

            info!(
                backend = %victim.address(),
                outage_secs = outage.as_secs(),
                "Simulating backend failure"
            );
            victim.set_simulated_down(true);
            let _ = self
                .events
                .send(SimEvent::BackendDown(victim.address().to_string()));

            let keep_running = self.pause(outage).await;

            info!(backend = %victim.address(), "Recovering backend");
            victim.set_simulated_down(false);
            let _ = self
                .events
                .send(SimEvent::BackendRecovered(victim.address().to_string()));

            if !keep_running || !self.pause(self.recovery_gap).await {
                return;
            }
        }
    }

    /// Sleep for `duration`, returning false if shutdown fired first.
    async fn pause(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.shutdown.recv() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::Backend;

    #[tokio::test]
    async fn test_simulator_cycle() {
        let pool = Arc::new(Pool::new());
        pool.add(Arc::new(Backend::new("127.0.0.1:9001")));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let sim = FailureSimulator::with_timing(
            Arc::clone(&pool),
            shutdown_rx,
            Duration::from_millis(10),
            Duration::from_millis(50),
            Duration::from_millis(60),
            Duration::from_millis(50),
        );
        let mut events = sim.subscribe();
        let task = tokio::spawn(sim.run());

        let down = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(down, SimEvent::BackendDown("127.0.0.1:9001".to_string()));
        assert!(pool.lookup("127.0.0.1:9001").unwrap().is_simulated_down());

        let recovered = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            recovered,
            SimEvent::BackendRecovered("127.0.0.1:9001".to_string())
        );
        assert!(!pool.lookup("127.0.0.1:9001").unwrap().is_simulated_down());

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_simulator_recovers_on_shutdown() {
        let pool = Arc::new(Pool::new());
        pool.add(Arc::new(Backend::new("127.0.0.1:9001")));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let sim = FailureSimulator::with_timing(
            Arc::clone(&pool),
            shutdown_rx,
            Duration::from_millis(10),
            Duration::from_secs(60),
            Duration::from_secs(60),
            Duration::from_secs(60),
        );
        let mut events = sim.subscribe();
        let task = tokio::spawn(sim.run());

        // Wait for the outage to begin, then shut down mid-outage.
        tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(!pool.lookup("127.0.0.1:9001").unwrap().is_simulated_down());
    }
}
