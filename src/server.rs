use bincode::Options;
use bytes::Bytes;
use std::{
    collections::HashMap, fs, future::Future, net::SocketAddr, path::Path, pin::Pin, sync::Arc,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::adapter::{QuicServerAdapter, QuicStreamAdapter};
use crate::{RpcConfig, RpcError, RpcRequest, RpcResponse, Status};

/// Largest request envelope a stream may carry.
pub const MAX_REQUEST_BYTES: usize = 4 * 1024 * 1024;

type AsyncHandlerFn = Arc<
    dyn Fn(Vec<u8>) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, Status>> + Send>>
        + Send
        + Sync,
>;

type HandlerMap = Arc<RwLock<HashMap<String, AsyncHandlerFn>>>;

/// Method table plus the listener it is served on.
///
/// Cloning is cheap; clones share the same handler table.
#[derive(Clone)]
pub struct RpcServer {
    handlers: HandlerMap,

    pub socket_addr: Option<SocketAddr>,

    pub config: RpcConfig,
}

impl RpcServer {
    pub fn new(config: RpcConfig) -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            socket_addr: None,
            config,
        }
    }

    /// Registers a handler working on raw request/response payloads.
    /// A later registration under the same name replaces the earlier one.
    pub async fn register<F, Fut>(&self, method: &str, handler: F)
    where
        F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>, Status>> + Send + 'static,
    {
        let mut handlers = self.handlers.write().await;
        handlers.insert(
            method.to_string(),
            Arc::new(move |params: Vec<u8>| {
                Box::pin(handler(params)) as Pin<Box<dyn Future<Output = _> + Send>>
            }),
        );
    }

    /// Registers a handler that takes and returns bincode-encoded values.
    ///
    /// Params that do not decode as `Req` are the caller's fault and answer
    /// with `InvalidArgument`; a response that fails to encode is `Internal`.
    pub async fn register_typed<Req, Resp, F, Fut>(&self, method: &str, handler: F)
    where
        Req: serde::de::DeserializeOwned + Send + 'static,
        Resp: serde::Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let name = method.to_string();
        self.register(method, move |params: Vec<u8>| {
            let handler = handler.clone();
            let name = name.clone();
            async move {
                let request: Req = bincode::deserialize(&params).map_err(|e| {
                    Status::invalid_argument(format!("malformed {name} request: {e}"))
                })?;

                let response = handler(request).await?;

                bincode::serialize(&response).map_err(|e| {
                    Status::internal(format!("failed to encode {name} response: {e}"))
                })
            }
        })
        .await;
    }

    /// Sorted names of every registered method.
    pub async fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Runs one request against the handler table and builds its reply.
    pub async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        Self::dispatch_with(&self.handlers, request).await
    }

    async fn dispatch_with(handlers: &HandlerMap, request: RpcRequest) -> RpcResponse {
        let id = request.id();
        let handler = handlers.read().await.get(request.method()).cloned();
        let result = match handler {
            Some(handler) => handler(request.into_params()).await,
            None => {
                warn!(method = %request.method(), "call to unknown method");
                Err(Status::unimplemented(format!(
                    "unknown method: {}",
                    request.method()
                )))
            }
        };
        RpcResponse::from_result(id, result)
    }

    pub async fn start(&mut self, mut server: s2n_quic::Server) -> Result<(), RpcError> {
        self.start_with_adapter(&mut server).await
    }

    async fn start_with_adapter<A>(&mut self, server: &mut A) -> Result<(), RpcError>
    where
        A: QuicServerAdapter,
    {
        while let Some(mut connection) = server.accept().await {
            let handlers = self.handlers.clone();

            tokio::spawn(async move {
                debug!("connection accepted");
                while let Ok(Some(stream)) = connection.accept_bidirectional_stream().await {
                    tokio::spawn(Self::handle_stream(handlers.clone(), stream));
                }
                debug!("connection closed");
            });
        }

        Ok(())
    }

    /// Serves the single request carried by `stream`.
    async fn handle_stream(handlers: HandlerMap, mut stream: Box<dyn QuicStreamAdapter + Send>) {
        let mut request_data = Vec::with_capacity(8192);

        let response = loop {
            let chunk = match stream.receive_bytes().await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    if !request_data.is_empty() {
                        debug!(
                            bytes = request_data.len(),
                            "stream closed before a complete request arrived"
                        );
                    }
                    return;
                }
                Err(e) => {
                    debug!(error = %e, "stream error while reading request");
                    return;
                }
            };

            request_data.extend_from_slice(&chunk);

            match decode_request(&request_data) {
                Framing::Complete(request) => {
                    debug!(id = request.id(), method = %request.method(), "rpc request");
                    break Self::dispatch_with(&handlers, request).await;
                }
                Framing::Partial => continue,
                Framing::Rejected(status) => {
                    let id = request_id_prefix(&request_data);
                    warn!(
                        id,
                        bytes = request_data.len(),
                        reason = %status.message(),
                        "rejected request frame"
                    );
                    break RpcResponse::from_result(id, Err(status));
                }
            }
        };

        match bincode::serialize(&response) {
            Ok(response_data) => {
                let sent = stream.send_bytes(Bytes::from(response_data)).await;
                if let Err(e) = sent.and_then(|_| stream.finish_send()) {
                    debug!(error = %e, "failed to send response");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode response"),
        }
    }

    /// Starts listening on `config.bind_address` and records the bound address.
    pub fn bind(&mut self) -> Result<s2n_quic::Server, RpcError> {
        let cert_path = canonicalize_path(&self.config.cert_path)?;
        let key_path =
            self.config.key_path.as_ref().ok_or_else(|| {
                RpcError::ConfigError("Server key path not configured".to_string())
            })?;
        let key_path = canonicalize_path(key_path)?;

        let server = s2n_quic::Server::builder()
            .with_tls((cert_path.as_path(), key_path.as_path()))
            .map_err(|e| RpcError::TlsError(format!("{:?}", e)))?
            .with_io(self.config.bind_address.as_str())
            .map_err(|e| RpcError::ConfigError(format!("{:?}", e)))?
            .start()
            .map_err(|e| RpcError::ConfigError(format!("{:?}", e)))?;

        let local_addr = server.local_addr()?;

        self.socket_addr = Some(local_addr);
        info!(addr = %local_addr, "RPC server listening");
        Ok(server)
    }
}

enum Framing {
    Complete(RpcRequest),
    Partial,
    Rejected(Status),
}

/// Decodes a request from the bytes received so far.
///
/// Only running out of input means more bytes may help; any other decode
/// failure, or a frame that is or claims to be past [`MAX_REQUEST_BYTES`],
/// is final.
fn decode_request(data: &[u8]) -> Framing {
    let truncated = match frame_options().deserialize::<RpcRequest>(data) {
        Ok(request) => return Framing::Complete(request),
        Err(e) => match *e {
            bincode::ErrorKind::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                true
            }
            bincode::ErrorKind::SizeLimit => false,
            other => {
                return Framing::Rejected(Status::invalid_argument(format!(
                    "malformed request frame: {other}"
                )))
            }
        },
    };

    // `params` decodes element by element, so its declared length is checked
    // here rather than by the limit above.
    let declared_too_large = truncated
        && frame_options()
            .deserialize::<(u64, String, u64)>(data)
            .map(|(_, _, params_len)| params_len > MAX_REQUEST_BYTES as u64)
            .unwrap_or(false);

    if !truncated || declared_too_large || data.len() > MAX_REQUEST_BYTES {
        Framing::Rejected(Status::invalid_argument(format!(
            "request exceeds {MAX_REQUEST_BYTES} bytes"
        )))
    } else {
        Framing::Partial
    }
}

/// Encoding of `bincode::serialize`, capped at [`MAX_REQUEST_BYTES`].
fn frame_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_REQUEST_BYTES as u64)
}

/// Request id from the leading bytes of a frame, or 0 if they never arrived.
fn request_id_prefix(data: &[u8]) -> u64 {
    data.get(..8)
        .and_then(|prefix| bincode::deserialize::<u64>(prefix).ok())
        .unwrap_or(0)
}

fn canonicalize_path(path: &Path) -> Result<std::path::PathBuf, RpcError> {
    fs::canonicalize(path).map_err(|e| {
        RpcError::ConfigError(format!("Failed to canonicalize {}: {e}", path.display()))
    })
}
