//! Minimal RPC service host.
//!
//! # Responsibilities
//! - Accept one request per connection, with a read deadline
//! - Dispatch by method name to registered handlers
//! - Reply with a result or error envelope

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use crate::protocol::{read_message, write_message, RpcRequest, RpcResponse};
use crate::resilience::deadline;

/// Reply to a method nobody registered.
pub const INVALID_METHOD: &str = "Invalid RPC Call Method";

/// Default time a caller has to send its request.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

type Method = Arc<dyn Fn(&Map<String, Value>) -> Result<Value, String> + Send + Sync>;

/// A set of named methods.
#[derive(Clone)]
pub struct Service {
    methods: HashMap<String, Method>,
    read_timeout: Duration,
}

impl Service {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn with_method<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// `Add` and `Sub` over the float params `a` and `b`.
    pub fn arithmetic() -> Self {
        Self::new()
            .with_method("Add", |params| operands(params).map(|(a, b)| json!(a + b)))
            .with_method("Sub", |params| operands(params).map(|(a, b)| json!(a - b)))
    }

    /// Run the method named by `request`.
    pub fn call(&self, request: &RpcRequest) -> RpcResponse {
        let no_params = Map::new();
        match self.methods.get(&request.method) {
            Some(method) => match method(request.named_params().unwrap_or(&no_params)) {
                Ok(value) => RpcResponse::result(value),
                Err(message) => RpcResponse::error(message),
            },
            None => RpcResponse::error(INVALID_METHOD),
        }
    }

    /// Serve a single request on `stream`.
    pub async fn handle(&self, mut stream: TcpStream, peer: SocketAddr) {
        let (read_half, mut write_half) = stream.split();
        let mut reader = BufReader::new(read_half);

        let read = read_message::<RpcRequest, _>(&mut reader);
        let response = match deadline("request read", self.read_timeout, read).await {
            Ok(Ok(request)) => {
                tracing::debug!(peer_addr = %peer, method = %request.method, "Request received");
                self.call(&request)
            }
            Ok(Err(e)) => {
                tracing::warn!(peer_addr = %peer, error = %e, "Failed to decode request");
                RpcResponse::error("error decoding request")
            }
            Err(e) => {
                tracing::warn!(peer_addr = %peer, error = %e, "Request not received in time");
                return;
            }
        };

        if let Err(e) = write_message(&mut write_half, &response).await {
            tracing::warn!(peer_addr = %peer, error = %e, "Failed to write response");
        }
        let _ = write_half.shutdown().await;
    }

    /// Accept connections on `listener` until shutdown is signalled.
    pub async fn serve(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) {
        let service = Arc::new(self);
        tracing::info!(address = ?listener.local_addr().ok(), "Service listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let service = Arc::clone(&service);
                            tokio::spawn(async move { service.handle(stream, peer).await });
                        }
                        Err(e) => tracing::error!(error = %e, "Failed to accept connection"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Service received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

impl Default for Service {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Service")
            .field("methods", &names)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

fn operands(params: &Map<String, Value>) -> Result<(f64, f64), String> {
    let number = |name: &str| {
        params
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| format!("param '{}' must be a number", name))
    };
    Ok((number("a")?, number("b")?))
}
