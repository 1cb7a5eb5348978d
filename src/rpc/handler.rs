//! Client request handling.
//!
//! # Responsibilities
//! - Decode one request envelope per client connection
//! - Pick a backend, moving on to the next one when a dial fails
//! - Relay the request and the backend's reply unchanged
//! - Answer every failure with an error envelope
//!
//! # Design Decisions
//! - One outbound connection per client request, never pooled
//! - A candidate walk tries each registered backend at most once
//! - Failing to write the final reply is only logged

use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::config::{DialFailurePolicy, TimeoutConfig};
use crate::load_balancer::{BackendTarget, Dispatcher};
use crate::net::dial;
use crate::observability::{metrics, span};
use crate::protocol::{read_message, write_message, CodecError, RpcRequest, RpcResponse};
use crate::resilience::{deadline, should_retry, Elapsed};

/// The registry was empty.
pub const NO_SERVER: &str = "no server available";
/// Every registered backend refused the connection.
pub const NO_REACHABLE_SERVER: &str = "no reachable server available";
pub const DECODE_ERROR: &str = "error decoding request";
pub const CONNECT_ERROR: &str = "error connecting to server";
pub const RELAY_ERROR: &str = "error relaying request to server";
pub const RESPONSE_ERROR: &str = "error receiving response from server";

/// A framed read or write that failed or ran out of time.
#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Timeout(#[from] Elapsed),
}

async fn timed<T, F>(operation: &'static str, limit: Duration, step: F) -> Result<T, StepError>
where
    F: Future<Output = Result<T, CodecError>>,
{
    Ok(deadline(operation, limit, step).await??)
}

/// How a request ended, for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Relayed,
    BadRequest,
    NoServer,
    Exhausted,
    DialFailed,
    RelayFailed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Relayed => "relayed",
            Outcome::BadRequest => "bad_request",
            Outcome::NoServer => "no_server",
            Outcome::Exhausted => "exhausted",
            Outcome::DialFailed => "dial_failed",
            Outcome::RelayFailed => "relay_failed",
        }
    }
}

/// Serves one client connection at a time; cheap to clone per connection.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    dispatcher: Dispatcher,
    timeouts: TimeoutConfig,
    policy: DialFailurePolicy,
}

impl RequestHandler {
    pub fn new(dispatcher: Dispatcher, timeouts: TimeoutConfig, policy: DialFailurePolicy) -> Self {
        Self {
            dispatcher,
            timeouts,
            policy,
        }
    }

    /// Handle a single request on `stream` and close it.
    pub async fn handle<S>(&self, stream: S, peer: SocketAddr, connection: u64)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.serve(stream)
            .instrument(span::request_span(peer, connection))
            .await
    }

    async fn serve<S>(&self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let start = Instant::now();
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        let (response, outcome) = self.respond(&mut reader).await;

        let written = timed(
            "client write",
            self.timeouts.io(),
            write_message(&mut write_half, &response),
        );
        if let Err(e) = written.await {
            tracing::warn!(error = %e, "Failed to write response to client");
        }
        let _ = write_half.shutdown().await;

        metrics::record_request(outcome.as_str(), start);
        tracing::debug!(
            outcome = outcome.as_str(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request finished"
        );
    }

    /// Work out the reply for the request waiting on `reader`.
    async fn respond<R>(&self, reader: &mut R) -> (RpcResponse, Outcome)
    where
        R: AsyncBufRead + Unpin,
    {
        let request: RpcRequest = match timed("client read", self.timeouts.io(), read_message(reader)).await {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to decode client request");
                return (RpcResponse::error(DECODE_ERROR), Outcome::BadRequest);
            }
        };

        tracing::debug!(method = %request.method, "Request decoded");

        let (backend, target) = match self.connect().await {
            Ok(connected) => connected,
            Err(outcome) => {
                let message = match outcome {
                    Outcome::NoServer => NO_SERVER,
                    Outcome::Exhausted => NO_REACHABLE_SERVER,
                    _ => CONNECT_ERROR,
                };
                return (RpcResponse::error(message), outcome);
            }
        };

        match self.relay(backend, &request).await {
            Ok(response) => {
                tracing::info!(
                    method = %request.method,
                    backend = %target.serving_address,
                    "Request relayed"
                );
                (response, Outcome::Relayed)
            }
            Err(message) => {
                tracing::warn!(backend = %target.serving_address, reason = message, "Relay failed");
                (RpcResponse::error(message), Outcome::RelayFailed)
            }
        }
    }

    /// Dial candidates in rotation until one accepts.
    async fn connect(&self) -> Result<(TcpStream, BackendTarget), Outcome> {
        let mut candidates = self.dispatcher.candidates();

        while let Some(target) = candidates.next() {
            match dial(&target.serving_address, self.timeouts.connect()).await {
                Ok(stream) => {
                    metrics::record_dispatch_attempt("connected");
                    tracing::debug!(backend = %target, attempt = candidates.attempted(), "Backend connected");
                    return Ok((stream, target));
                }
                Err(e) if should_retry(self.policy, &e) => {
                    metrics::record_dispatch_attempt("retried");
                    tracing::warn!(
                        backend = %target,
                        attempt = candidates.attempted(),
                        error = %e,
                        "Backend unreachable, trying next"
                    );
                }
                Err(e) => {
                    metrics::record_dispatch_attempt("failed");
                    tracing::error!(backend = %target, error = %e, "Failed to connect to backend");
                    return Err(Outcome::DialFailed);
                }
            }
        }

        if candidates.attempted() == 0 {
            tracing::warn!("No backend registered");
            Err(Outcome::NoServer)
        } else {
            tracing::warn!(attempted = candidates.attempted(), "Every backend was unreachable");
            Err(Outcome::Exhausted)
        }
    }

    /// Send `request` to the backend and read back its reply.
    async fn relay(&self, mut backend: TcpStream, request: &RpcRequest) -> Result<RpcResponse, &'static str> {
        let (read_half, mut write_half) = backend.split();

        timed("backend write", self.timeouts.io(), write_message(&mut write_half, request))
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Backend write failed");
                RELAY_ERROR
            })?;

        let mut reader = BufReader::new(read_half);
        timed("backend read", self.timeouts.io(), read_message(&mut reader))
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Backend read failed");
                RESPONSE_ERROR
            })
    }
}
