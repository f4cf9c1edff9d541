//! flowline binary entry point.

use flowline::config::{BasicValidator, ConfigLoader, PortConflictValidator};
use flowline::demo::EchoServer;
use flowline::sim::FailureSimulator;
use flowline::stats::StatsServer;
use flowline::LoadBalancer;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default configuration file path.
const CONFIG_PATH: &str = "flowline.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::new()
        .with_validator(BasicValidator::new())
        .with_validator(PortConflictValidator::new())
        .load_or_default(CONFIG_PATH)?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("flowline={}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        listen_addr = %config.listen_addr,
        backends = config.backends.len(),
        health_check_interval_secs = config.health_check_interval.as_secs(),
        connect_timeout_secs = config.connect_timeout.as_secs(),
        "Configuration loaded"
    );

    let balancer = Arc::new(LoadBalancer::new(config.clone()));

    if config.demo.spawn_backends {
        for entry in &config.backends {
            let mut echo = EchoServer::new(&entry.address);
            if let Some(backend) = balancer.pool().lookup(&entry.address) {
                echo = echo.with_backend(backend);
            }
            tokio::spawn(async move {
                if let Err(e) = echo.run().await {
                    error!(error = %e, "Echo backend failed");
                }
            });
        }
    }

    if config.demo.simulate_failures {
        let simulator = FailureSimulator::new(
            Arc::clone(balancer.pool()),
            balancer.subscribe_shutdown(),
        );
        tokio::spawn(simulator.run());
    }

    let mut stats_server = if config.stats.enabled {
        let mut server = StatsServer::new(Arc::clone(balancer.pool()), &config.stats.listen_addr);
        server.start().await?;
        Some(server)
    } else {
        None
    };

    {
        let balancer = Arc::clone(&balancer);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            info!("Shutdown signal received");
            balancer.stop();
        });
    }

    balancer.start().await?;

    if let Some(server) = stats_server.as_mut() {
        let _ = server.stop().await;
    }

    info!("Shutdown complete");
    Ok(())
}
