//! # Configuration System
//!
//! TOML-based configuration for the balancer: parsing, defaults, and
//! validation.
//!
//! ## Example Configuration
//!
//! ```toml
//! listen_addr = "127.0.0.1:8080"
//! health_check_interval = "10s"
//! connect_timeout = "5s"
//!
//! [[backends]]
//! address = "127.0.0.1:9001"
//! weight = 3
//!
//! [[backends]]
//! address = "127.0.0.1:9002"
//!
//! [stats]
//! enabled = true
//! listen_addr = "127.0.0.1:8081"
//! ```

mod error;
mod loader;
mod types;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use types::{
    BackendEntry, BalancerConfig, DemoConfig, LogLevel, LoggingConfig, StatsConfig,
};
pub use validation::{
    BasicValidator, PortConflictValidator, ValidationError, ValidationResult, Validator,
};
