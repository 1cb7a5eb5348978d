//! Client RPC subsystem.
//!
//! # Data Flow
//! ```text
//! Client connection
//!     → server.rs (accept, optional TLS handshake, track)
//!     → handler.rs (decode request)
//!     → load_balancer::Dispatcher (candidate walk)
//!     → net::dial (bounded connect, retry on network failure)
//!     → relay request, relay reply, close both connections
//! ```
//!
//! # Design Decisions
//! - Exactly one request per client connection
//! - Clients always get a JSON envelope unless their connection is gone

pub mod handler;
pub mod server;

pub use handler::RequestHandler;
pub use server::RpcServer;
