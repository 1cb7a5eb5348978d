//! Heartbeat-driven TCP load balancer for JSON RPC.
//!
//! Backends keep a persistent heartbeat connection to the balancer; clients
//! send one JSON request per connection, which is relayed round robin to a
//! live backend.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod resilience;
pub mod rpc;

pub use client::{ClientError, RpcClient};
pub use config::BalancerConfig;
pub use error::BalancerError;
pub use lifecycle::{Balancer, Shutdown};
