//! # Stats Endpoint
//!
//! Read-only HTTP collaborator over the pool's snapshot methods.
//!
//! - `GET /stats`: uptime, backend totals, and per-backend counters as JSON
//! - `GET /health`: 200 while at least one backend is healthy, 503 otherwise

mod error;
mod server;

pub use error::{StatsError, StatsResult};
pub use server::StatsServer;
