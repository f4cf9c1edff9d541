//! Balancer error types.

use thiserror::Error;

/// Errors that can occur in the dispatch engine.
#[derive(Debug, Error)]
pub enum BalancerError {
    /// Dial attempted on a simulated-down backend.
    #[error("backend {0} is down")]
    BackendDown(String),

    /// Underlying network connect failed.
    #[error("dial to {address} failed: {source}")]
    Dial {
        /// Backend address.
        address: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Connect did not complete within the configured timeout.
    #[error("dial to {address} timed out")]
    DialTimeout {
        /// Backend address.
        address: String,
    },

    /// Every selection came back empty.
    #[error("no healthy backend available")]
    NoHealthyBackend,

    /// Failed to bind the listening socket.
    #[error("failed to bind listener on {address}: {source}")]
    Bind {
        /// Listen address.
        address: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// IO error during proxying.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for balancer operations.
pub type BalancerResult<T> = Result<T, BalancerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BalancerError::BackendDown("10.0.0.1:9001".to_string());
        assert_eq!(err.to_string(), "backend 10.0.0.1:9001 is down");

        let err = BalancerError::DialTimeout {
            address: "10.0.0.1:9001".to_string(),
        };
        assert_eq!(err.to_string(), "dial to 10.0.0.1:9001 timed out");

        assert_eq!(
            BalancerError::NoHealthyBackend.to_string(),
            "no healthy backend available"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: BalancerError = io_err.into();
        assert!(matches!(err, BalancerError::Io(_)));
    }
}
