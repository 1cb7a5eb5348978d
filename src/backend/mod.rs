//! Backend-side runtime.
//!
//! # Data Flow
//! ```text
//! heartbeat.rs: backend ──persistent TCP──▶ balancer heartbeat listener
//!     first message carries the serving port, then one beat per interval
//!
//! service.rs: balancer ──one request per connection──▶ backend
//!     method lookup → handler → {"result":..} | {"error":..}
//! ```
//!
//! # Design Decisions
//! - A backend stays in rotation only while its heartbeat connection lives
//! - Losing the balancer ends the sender with an error so the host can stop

pub mod heartbeat;
pub mod service;

pub use heartbeat::{HeartbeatError, HeartbeatSender};
pub use service::Service;
