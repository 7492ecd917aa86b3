//! Identity resolution and chat relay services over a QUIC RPC transport.
//!
//! The crate has three layers:
//!
//! - the RPC runtime ([`RpcServer`], [`RpcClient`], [`RpcConfig`]) that moves
//!   bincode-encoded [`RpcRequest`]/[`RpcResponse`] envelopes over `s2n-quic`
//!   bidirectional streams,
//! - typed service surfaces in [`services`] (`Greeter.SayHello`, `Chat.Join`,
//!   `Chat.Send`),
//! - the handlers that hold the actual decisions: [`identity::IdentityResolver`]
//!   and [`relay::ChatRelay`].
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use thiserror::Error;

mod adapter;
mod client;
mod server;

pub mod identity;
pub mod relay;
pub mod services;
pub mod status;
pub mod telemetry;
pub mod tls;

pub use client::RpcClient;
pub use server::{RpcServer, MAX_REQUEST_BYTES};
pub use status::{Code, Status};

pub mod runtime {
    //! Helpers for configuring the Tokio runtime that drives a server.
    use std::{env, io, thread};
    use tokio::runtime::{Builder, Runtime};

    /// Environment variable that controls the number of server worker threads.
    pub const SERVER_THREADS_ENV: &str = "MSA_SERVER_THREADS";

    /// Resolves the worker thread count. A positive `explicit` value wins,
    /// then [`SERVER_THREADS_ENV`], then the available CPU parallelism.
    pub fn server_worker_threads(explicit: Option<usize>) -> usize {
        explicit
            .filter(|threads| *threads > 0)
            .or_else(|| env::var(SERVER_THREADS_ENV).ok().as_deref().and_then(parse_threads))
            .unwrap_or_else(default_worker_threads)
    }

    /// Builds the multi-threaded runtime used by `msa-server`.
    pub fn build_server_runtime(explicit: Option<usize>) -> io::Result<Runtime> {
        Builder::new_multi_thread()
            .worker_threads(server_worker_threads(explicit))
            .thread_name("msa-rpc-worker")
            .enable_all()
            .build()
    }

    fn default_worker_threads() -> usize {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    fn parse_threads(raw: &str) -> Option<usize> {
        let value = raw.trim().parse::<usize>().ok()?;
        (value > 0).then_some(value)
    }

}

/// Port the services listen on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 50051;

/// Listen address used by the binaries when none is given.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:50051";

#[cfg(not(test))]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(test)]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("Request timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The remote method answered with an explicit failure.
    #[error("{0}")]
    Status(#[from] Status),
}

impl RpcError {
    /// The remote status code, when the failure came from the called method.
    pub fn code(&self) -> Option<Code> {
        match self {
            RpcError::Status(status) => Some(status.code()),
            _ => None,
        }
    }
}

impl From<RpcError> for Status {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Status(status) => status,
            other => Status::internal(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    id: u64,
    method: String,
    params: Vec<u8>,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<u8>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &[u8] {
        &self.params
    }

    pub fn into_params(self) -> Vec<u8> {
        self.params
    }
}

/// Reply envelope. Exactly one of `result` and `error` is set.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    id: u64,
    result: Option<Vec<u8>>,
    error: Option<Status>,
}

impl RpcResponse {
    pub fn from_result(id: u64, result: Result<Vec<u8>, Status>) -> Self {
        match result {
            Ok(data) => Self {
                id,
                result: Some(data),
                error: None,
            },
            Err(status) => Self {
                id,
                result: None,
                error: Some(status),
            },
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn result(&self) -> Option<&Vec<u8>> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&Status> {
        self.error.as_ref()
    }

    pub fn into_result(self) -> Result<Vec<u8>, RpcError> {
        match (self.result, self.error) {
            (Some(data), None) => Ok(data),
            (None, Some(status)) => Err(RpcError::Status(status)),
            _ => Err(RpcError::StreamError("Invalid response".into())),
        }
    }
}

/// Connection settings shared by servers and clients.
///
/// A server reads `cert_path`, `key_path` and `bind_address`; a client reads
/// `cert_path` as its trust root, `server_name` for verification and
/// `bind_address` for its local socket.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub cert_path: PathBuf,

    pub key_path: Option<PathBuf>,

    pub server_name: String,

    pub bind_address: String,

    /// Client only: ask s2n-quic to keep the connection alive with its own
    /// ping interval while no call is in flight.
    pub keep_alive: bool,

    pub request_timeout: Duration,
}

impl RpcConfig {
    pub fn new<P: Into<PathBuf>>(cert_path: P, bind_address: impl Into<String>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: None,
            server_name: "localhost".to_string(),
            bind_address: bind_address.into(),
            keep_alive: true,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_key_path<P: Into<PathBuf>>(mut self, key_path: P) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = server_name.into();
        self
    }

    pub fn with_keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
