//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure for the balancer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Address the balancer listens on, in `host:port` form.
    pub listen_addr: String,

    /// Backends to dispatch to, in configuration order.
    #[serde(default)]
    pub backends: Vec<BackendEntry>,

    /// Interval between active health-check rounds.
    #[serde(with = "humantime_serde")]
    pub health_check_interval: Duration,

    /// Timeout for backend dials (dispatch and probes alike).
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Stats endpoint configuration.
    pub stats: StatsConfig,

    /// Local-demo configuration.
    pub demo: DemoConfig,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            backends: vec![
                BackendEntry::new("127.0.0.1:9001", 1),
                BackendEntry::new("127.0.0.1:9002", 1),
            ],
            health_check_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

/// Configuration for a single backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendEntry {
    /// Backend address in `host:port` form.
    pub address: String,

    /// Weight for the weighted round-robin strategy. Must be at least 1.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl BackendEntry {
    /// Create a new backend entry.
    pub fn new(address: impl Into<String>, weight: u32) -> Self {
        Self {
            address: address.into(),
            weight,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is not set.
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level (most verbose).
    Trace,
    /// Debug level.
    Debug,
    /// Info level (default).
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level (least verbose).
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Stats HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Whether the stats endpoint is served.
    pub enabled: bool,

    /// Address the stats server listens on.
    pub listen_addr: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Local-demo configuration: echo backends and failure injection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Spawn an echo server on every configured backend address.
    pub spawn_backends: bool,

    /// Run the random failure/recovery simulator.
    pub simulate_failures: bool,
}

fn default_weight() -> u32 {
    1
}
