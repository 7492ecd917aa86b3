use bytes::{Bytes, BytesMut};
use s2n_quic::{client::Connect, Client};
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::adapter::QuicConnectionAdapter;
use crate::{RpcConfig, RpcError, RpcRequest, RpcResponse};

/// One QUIC connection to an [`RpcServer`](crate::RpcServer); every call
/// runs on its own bidirectional stream.
pub struct RpcClient {
    connection: Arc<RwLock<Box<dyn QuicConnectionAdapter + Send + Sync>>>,
    config: RpcConfig,
    next_id: AtomicU64,
}

impl RpcClient {
    pub async fn connect(connect_addr: SocketAddr, config: RpcConfig) -> Result<Self, RpcError> {
        let client = Client::builder()
            .with_tls(config.cert_path.as_path())
            .map_err(|e| RpcError::TlsError(format!("{:?}", e)))?
            .with_io(config.bind_address.as_str())
            .map_err(|e| RpcError::ConfigError(format!("{:?}", e)))?
            .start()
            .map_err(|e| RpcError::ConfigError(format!("{:?}", e)))?;

        let connect = Connect::new(connect_addr).with_server_name(config.server_name.as_str());
        let mut connection = client
            .connect(connect)
            .await
            .map_err(|e| RpcError::ConnectionError(e.to_string()))?;

        if config.keep_alive {
            connection
                .keep_alive(true)
                .map_err(|e| RpcError::ConfigError(e.to_string()))?;
        }
        debug!(addr = %connect_addr, "connected");

        let connection: Box<dyn QuicConnectionAdapter + Send + Sync> = Box::new(connection);
        Ok(Self {
            connection: Arc::new(RwLock::new(connection)),
            config,
            next_id: AtomicU64::new(1),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_connection(
        connection: Box<dyn QuicConnectionAdapter + Send + Sync>,
        config: RpcConfig,
    ) -> Self {
        Self {
            connection: Arc::new(RwLock::new(connection)),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Sends `params` to `method` and waits for the reply payload.
    ///
    /// A reply carrying a [`Status`](crate::Status) comes back as
    /// [`RpcError::Status`]; no reply within `config.request_timeout` is
    /// [`RpcError::Timeout`].
    pub async fn call(&self, method: &str, params: Vec<u8>) -> Result<Vec<u8>, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req_data = bincode::serialize(&RpcRequest::new(id, method, params))?;

        let mut stream = {
            let mut conn = self.connection.write().await;
            conn.open_bidirectional_stream().await?
        };

        stream.send_bytes(Bytes::from(req_data)).await?;
        stream.finish_send()?;

        let read_future = async {
            let mut response_data = BytesMut::with_capacity(1024);
            loop {
                let chunk = match stream.receive_bytes().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(e) => return Err(e),
                };
                response_data.extend_from_slice(&chunk);

                if let Ok(response) = bincode::deserialize::<RpcResponse>(&response_data[..]) {
                    if response.id() != id {
                        return Err(RpcError::StreamError(format!(
                            "response id {} does not match request id {id}",
                            response.id()
                        )));
                    }
                    return response.into_result();
                }
            }
            Err(RpcError::ConnectionError(
                "Stream closed unexpectedly".into(),
            ))
        };

        match tokio::time::timeout(self.config.request_timeout, read_future).await {
            Ok(res) => res,
            Err(_) => Err(RpcError::Timeout),
        }
    }

    /// [`call`](Self::call) with bincode encoding on both sides.
    pub async fn call_typed<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp, RpcError>
    where
        Req: serde::Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let params = bincode::serialize(request)?;
        let response = self.call(method, params).await?;
        Ok(bincode::deserialize(&response)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapter::mock::{wait_for_sent, MockConnection, MockStreamState};
    use crate::{Code, Status};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    fn config() -> RpcConfig {
        RpcConfig::new("certs/test_cert.pem", "127.0.0.1:0")
            .with_request_timeout(Duration::from_millis(200))
    }

    pub(crate) fn make_client(state: Arc<Mutex<MockStreamState>>) -> RpcClient {
        RpcClient::with_connection(Box::new(MockConnection::with_state(state)), config())
    }

    pub(crate) async fn push_response(state: &Arc<Mutex<MockStreamState>>, response: RpcResponse) {
        let bytes = bincode::serialize(&response).expect("serialize response");
        state.lock().await.recv_plan.push_back(Ok(Some(bytes)));
    }

    #[tokio::test]
    async fn call_returns_success_payload() {
        let state = MockStreamState::shared();
        push_response(&state, RpcResponse::from_result(1, Ok(b"pong".to_vec()))).await;

        let client = make_client(state.clone());
        let response = client.call("ping", b"data".to_vec()).await.unwrap();
        assert_eq!(response, b"pong".to_vec());

        wait_for_sent(&state, 1).await;
        let sent = state.lock().await.sent.clone();
        let request: RpcRequest = bincode::deserialize(&sent[0]).unwrap();
        assert_eq!(request.id(), 1);
        assert_eq!(request.method(), "ping");
        assert_eq!(request.params(), b"data");
    }

    #[tokio::test]
    async fn call_surfaces_remote_status() {
        let state = MockStreamState::shared();
        push_response(
            &state,
            RpcResponse::from_result(1, Err(Status::invalid_argument("user must not be empty"))),
        )
        .await;

        let client = make_client(state);
        let err = client.call("Chat.Join", Vec::new()).await.unwrap_err();
        assert_eq!(err.code(), Some(Code::InvalidArgument));
        match err {
            RpcError::Status(status) => assert_eq!(status.message(), "user must not be empty"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn call_reassembles_chunked_response() {
        let state = MockStreamState::shared();
        let bytes =
            bincode::serialize(&RpcResponse::from_result(1, Ok(vec![7u8; 64]))).unwrap();
        {
            let mut guard = state.lock().await;
            for chunk in bytes.chunks(10) {
                guard.recv_plan.push_back(Ok(Some(chunk.to_vec())));
            }
        }

        let client = make_client(state);
        assert_eq!(client.call("blob", Vec::new()).await.unwrap(), vec![7u8; 64]);
    }

    #[tokio::test]
    async fn call_rejects_mismatched_response_id() {
        let state = MockStreamState::shared();
        push_response(&state, RpcResponse::from_result(99, Ok(Vec::new()))).await;

        let client = make_client(state);
        let err = client.call("ping", Vec::new()).await.unwrap_err();
        assert!(matches!(err, RpcError::StreamError(_)));
    }

    #[tokio::test]
    async fn call_detects_close_before_response() {
        let state = MockStreamState::shared();
        state.lock().await.recv_plan.push_back(Ok(None));

        let client = make_client(state);
        let err = client.call("ping", Vec::new()).await.unwrap_err();
        assert!(matches!(err, RpcError::ConnectionError(_)));
    }

    #[tokio::test]
    async fn call_times_out_when_server_is_silent() {
        let state = MockStreamState::shared();
        state.lock().await.hang_when_drained = true;

        let client = make_client(state);
        let err = client.call("ping", Vec::new()).await.unwrap_err();
        assert!(matches!(err, RpcError::Timeout));
    }

    #[tokio::test]
    async fn call_propagates_open_stream_failure() {
        let client = RpcClient::with_connection(
            Box::new(MockConnection::with_error(RpcError::StreamError("open".into()))),
            config(),
        );
        let err = client.call("ping", Vec::new()).await.unwrap_err();
        assert!(matches!(err, RpcError::StreamError(_)));
    }

    #[tokio::test]
    async fn request_ids_increase_per_call() {
        let first = MockStreamState::shared();
        push_response(&first, RpcResponse::from_result(1, Ok(Vec::new()))).await;
        let client = make_client(first);
        client.call("a", Vec::new()).await.unwrap();

        // The second call gets a fresh stream from the mock connection.
        let err = client.call("b", Vec::new()).await.unwrap_err();
        assert!(matches!(err, RpcError::ConnectionError(_)));
        assert_eq!(client.next_id.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn call_typed_decodes_response() {
        let state = MockStreamState::shared();
        let payload = bincode::serialize(&"Hello, Mary".to_string()).unwrap();
        push_response(&state, RpcResponse::from_result(1, Ok(payload))).await;

        let client = make_client(state);
        let reply: String = client
            .call_typed("Greeter.SayHello", &"456".to_string())
            .await
            .unwrap();
        assert_eq!(reply, "Hello, Mary");
    }
}
