//! Heartbeat sender.

use std::time::Duration;

use tokio::net::TcpStream;

use crate::protocol::{write_message, CodecError, HeartbeatMessage};

/// Interval between heartbeats.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    #[error("failed to reach balancer at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to send heartbeat: {0}")]
    Send(#[from] CodecError),
}

/// Keeps a backend registered with a balancer.
#[derive(Debug, Clone)]
pub struct HeartbeatSender {
    balancer: String,
    port: String,
    interval: Duration,
}

impl HeartbeatSender {
    /// `balancer` is the heartbeat address, `port` the port this backend
    /// serves RPC traffic on.
    pub fn new(balancer: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            balancer: balancer.into(),
            port: port.into(),
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Connect and send heartbeats until the connection breaks.
    ///
    /// Only returns on failure; the error means the balancer is gone.
    pub async fn run(self) -> Result<(), HeartbeatError> {
        let mut stream =
            TcpStream::connect(&self.balancer)
                .await
                .map_err(|source| HeartbeatError::Connect {
                    address: self.balancer.clone(),
                    source,
                })?;

        write_message(&mut stream, &HeartbeatMessage::first(self.port.as_str())).await?;
        tracing::info!(balancer = %self.balancer, port = %self.port, "Registered with balancer");

        let beat = HeartbeatMessage::beat();
        loop {
            tokio::time::sleep(self.interval).await;
            write_message(&mut stream, &beat).await?;
            tracing::trace!(balancer = %self.balancer, "Heartbeat sent");
        }
    }
}
