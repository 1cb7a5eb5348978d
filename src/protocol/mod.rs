//! Wire protocol subsystem.
//!
//! # Data Flow
//! ```text
//! backend ──{"heartbeat":true,"port":"9001"}\n──▶ heartbeat listener
//! backend ──{"heartbeat":true}\n (repeated)────▶ heartbeat listener
//!
//! client ──{"method":..,"params":{..}}\n──▶ balancer ──(same envelope)──▶ backend
//! client ◀──{"result":..} | {"error":..}\n── balancer ◀──(verbatim)────── backend
//! ```
//!
//! # Design Decisions
//! - One JSON value per line on every connection (codec.rs)
//! - No acknowledgement on the heartbeat channel
//! - Envelopes keep unknown keys so relaying is lossless

pub mod codec;
pub mod envelope;
pub mod heartbeat;

pub use codec::{read_message, write_message, CodecError};
pub use envelope::{RpcRequest, RpcResponse};
pub use heartbeat::HeartbeatMessage;
