//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection (heartbeat or client)
//!     → listener.rs (accept loop, connection limits)
//!     → tls.rs (client listener only, optional TLS handshake)
//!     → connection.rs (lifecycle tracking for graceful shutdown)
//!     → Hand off to the heartbeat listener or the request handler
//!
//! Outgoing backend connection
//!     → dial.rs (bounded connect, error classification)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each client connection tracked for graceful shutdown
//! - TLS is optional and handled transparently

pub mod connection;
pub mod dial;
pub mod listener;
pub mod tls;

pub use dial::{dial, DialError};
pub use listener::{Listener, ListenerError};
