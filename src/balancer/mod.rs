//! # Dispatch Engine
//!
//! The core of the balancer: the backend pool with its health state, the
//! pluggable selection strategies, the active health-check loop, and the
//! per-connection dispatch path.
//!
//! ## Data Flow
//!
//! ```text
//! Client connects
//!     → server.rs (accept loop, one task per connection)
//!     → algorithm.rs (select a healthy backend from pool.rs)
//!     → backend.rs (dial with timeout; failure marks the backend down
//!       and the dispatch retries with the next selection)
//!     → proxy.rs (bidirectional relay until either side closes)
//!
//! In parallel:
//!     health.rs probes every backend each interval and updates liveness.
//! ```

pub mod algorithm;
pub mod backend;
pub mod error;
pub mod health;
pub mod pool;
pub mod proxy;
pub mod server;

pub use algorithm::{Algorithm, LeastConnections, RoundRobin, WeightedRoundRobin};
pub use backend::{Backend, BackendSnapshot, SessionGuard};
pub use error::{BalancerError, BalancerResult};
pub use health::HealthScheduler;
pub use pool::Pool;
pub use server::LoadBalancer;
