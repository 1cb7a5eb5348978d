//! Per-request spans.

use std::net::SocketAddr;

use tracing::Span;
use uuid::Uuid;

/// Open a span for one client request, tagged with a fresh request ID and
/// the connection's position in accept order.
pub fn request_span(peer: SocketAddr, connection: u64) -> Span {
    let request_id = Uuid::new_v4();
    tracing::info_span!("request", %request_id, connection, client = %peer)
}
