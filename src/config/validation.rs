//! Configuration validation system.

use super::types::BalancerConfig;
use std::net::SocketAddr;

/// A single validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// Error message.
    pub message: String,
}

impl ValidationError {
    /// Create a new error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new empty (valid) result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Check if the validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get all validation errors.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Merge another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }
}

/// Trait for configuration validators.
pub trait Validator: std::fmt::Debug + Send + Sync {
    /// Validate a configuration and return any errors.
    fn validate(&self, config: &BalancerConfig) -> ValidationResult;
}

/// Built-in validator for basic configuration checks.
#[derive(Debug, Default)]
pub struct BasicValidator;

impl BasicValidator {
    /// Create a new basic validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for BasicValidator {
    fn validate(&self, config: &BalancerConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.listen_addr.parse::<SocketAddr>().is_err() {
            result.add_error(ValidationError::new(
                "listen_addr",
                format!("not a valid host:port address: {}", config.listen_addr),
            ));
        }

        if config.backends.is_empty() {
            result.add_error(ValidationError::new(
                "backends",
                "at least one backend is required",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for (i, backend) in config.backends.iter().enumerate() {
            if backend.address.parse::<SocketAddr>().is_err() {
                result.add_error(ValidationError::new(
                    format!("backends[{i}].address"),
                    format!("not a valid host:port address: {}", backend.address),
                ));
            }

            if backend.weight == 0 {
                result.add_error(ValidationError::new(
                    format!("backends[{i}].weight"),
                    "weight must be at least 1",
                ));
            }

            if !seen.insert(&backend.address) {
                result.add_error(ValidationError::new(
                    format!("backends[{i}].address"),
                    format!("duplicate backend address: {}", backend.address),
                ));
            }
        }

        if config.health_check_interval.is_zero() {
            result.add_error(ValidationError::new(
                "health_check_interval",
                "interval must be greater than zero",
            ));
        }

        if config.connect_timeout.is_zero() {
            result.add_error(ValidationError::new(
                "connect_timeout",
                "timeout must be greater than zero",
            ));
        }

        result
    }
}

/// Validator that checks the stats endpoint does not collide with the
/// balancer listener or any backend.
#[derive(Debug, Default)]
pub struct PortConflictValidator;

impl PortConflictValidator {
    /// Create a new port conflict validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for PortConflictValidator {
    fn validate(&self, config: &BalancerConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !config.stats.enabled {
            return result;
        }

        if config.stats.listen_addr == config.listen_addr {
            result.add_error(ValidationError::new(
                "stats.listen_addr",
                format!("conflicts with listen_addr ({})", config.listen_addr),
            ));
        }

        for (i, backend) in config.backends.iter().enumerate() {
            if config.stats.listen_addr == backend.address {
                result.add_error(ValidationError::new(
                    "stats.listen_addr",
                    format!("conflicts with backends[{i}] ({})", backend.address),
                ));
            }
        }

        result
    }
}
