//! One-shot RPC client.
//!
//! Opens a connection per call, sends one request envelope and reads one
//! reply, optionally over TLS.

use std::time::Duration;

use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

use crate::protocol::{read_message, write_message, CodecError, RpcRequest, RpcResponse};
use crate::resilience::{deadline, Elapsed};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TLS handshake failed: {0}")]
    Tls(#[source] std::io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Timeout(#[from] Elapsed),
    /// The balancer or backend answered with an error envelope.
    #[error("remote error: {0}")]
    Remote(String),
    #[error("response carried neither result nor error")]
    MissingResult,
}

/// Client for a balancer (or a backend directly).
#[derive(Clone)]
pub struct RpcClient {
    address: String,
    tls: Option<(TlsConnector, ServerName<'static>)>,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            tls: None,
            timeout: Duration::from_secs(10),
        }
    }

    /// Speak TLS, verifying the peer as `server_name`.
    pub fn with_tls(mut self, connector: TlsConnector, server_name: ServerName<'static>) -> Self {
        self.tls = Some((connector, server_name));
        self
    }

    /// Bound for each of connect, handshake, write and read.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Call `method` and return its `result`.
    pub async fn call(&self, method: &str, params: Map<String, Value>) -> Result<Value, ClientError> {
        let response = self.call_raw(&RpcRequest::new(method).with_params(params)).await?;
        if let Some(message) = response.error_message() {
            return Err(ClientError::Remote(message.to_string()));
        }
        response.result_value().cloned().ok_or(ClientError::MissingResult)
    }

    /// Send `request` and return the reply envelope as received.
    pub async fn call_raw(&self, request: &RpcRequest) -> Result<RpcResponse, ClientError> {
        let stream = deadline("connect", self.timeout, TcpStream::connect(&self.address))
            .await?
            .map_err(|source| ClientError::Connect {
                address: self.address.clone(),
                source,
            })?;

        match &self.tls {
            Some((connector, server_name)) => {
                let stream = deadline(
                    "tls handshake",
                    self.timeout,
                    connector.connect(server_name.clone(), stream),
                )
                .await?
                .map_err(ClientError::Tls)?;
                self.exchange(stream, request).await
            }
            None => self.exchange(stream, request).await,
        }
    }

    async fn exchange<S>(&self, stream: S, request: &RpcRequest) -> Result<RpcResponse, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (read_half, mut write_half) = tokio::io::split(stream);
        deadline("write", self.timeout, write_message(&mut write_half, request)).await??;

        let mut reader = BufReader::new(read_half);
        let response = deadline("read", self.timeout, read_message(&mut reader)).await??;
        tracing::debug!(address = %self.address, method = %request.method, "Call completed");
        Ok(response)
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("address", &self.address)
            .field("tls", &self.tls.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}
