//! # flowline
//!
//! A Layer-4 TCP load balancer: one listening endpoint, a pool of upstream
//! backends, pluggable selection strategies, and active health checking.
//!
//! ## Architecture
//!
//! ```text
//!                ┌────────────────────────────────────────────────┐
//!                │                   FLOWLINE                     │
//!                │                                                │
//!   Client ──────┼─▶ accept loop ─▶ algorithm ─▶ dial ─▶ relay ───┼──▶ Backend
//!                │   (balancer::     (round-robin,    (retry on   │
//!                │    server)         least-conn,      failure)   │
//!                │                    weighted-rr)                │
//!                │                                                │
//!                │  ┌──────────────────────────────────────────┐  │
//!                │  │          shared backend pool             │  │
//!                │  │   liveness · session tracking · stats    │  │
//!                │  └──────────────────────────────────────────┘  │
//!                │        ▲                      ▲                │
//!                │        │                      │                │
//!                │   health checker         stats endpoint        │
//!                │   (periodic probes)  (GET /stats, /health)     │
//!                └────────────────────────────────────────────────┘
//! ```
//!
//! The dispatch engine lives in [`balancer`]; [`config`] loads and validates
//! the TOML file; [`stats`] serves the read-only HTTP view; [`demo`] and
//! [`sim`] exist to exercise the system locally.

pub mod balancer;
pub mod config;
pub mod demo;
pub mod sim;
pub mod stats;

pub use balancer::{Algorithm, Backend, BalancerError, LoadBalancer, Pool};
pub use config::{BalancerConfig, ConfigLoader};
