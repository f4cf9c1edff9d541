//! # Demo Backends
//!
//! Line-oriented echo servers used to exercise the balancer locally.

mod echo;

pub use echo::EchoServer;
