use super::types::*;
use crate::{RpcConfig, RpcError, RpcServer, Status};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Handler trait that implementations of the `Chat` service provide.
#[async_trait]
pub trait ChatHandler: Send + Sync + 'static {
    async fn join(&self, request: ChatMessage) -> Result<ChatMessage, Status>;
    async fn send(&self, request: ChatMessage) -> Result<ChatMessage, Status>;
}

/// Server that registers a [`ChatHandler`] with an [`RpcServer`].
pub struct ChatServer<H: ChatHandler> {
    handler: Arc<H>,
    rpc_server: RpcServer,
}

impl<H: ChatHandler> ChatServer<H> {
    pub fn new(handler: H, config: RpcConfig) -> Self {
        Self {
            handler: Arc::new(handler),
            rpc_server: RpcServer::new(config),
        }
    }

    /// Registers all service methods with the RPC server.
    pub async fn register_all(&mut self) {
        {
            let handler = self.handler.clone();
            self.rpc_server
                .register_typed(JOIN, move |request: ChatMessage| {
                    let handler = handler.clone();
                    async move { handler.join(request).await }
                })
                .await;
        }
        {
            let handler = self.handler.clone();
            self.rpc_server
                .register_typed(SEND, move |request: ChatMessage| {
                    let handler = handler.clone();
                    async move { handler.send(request).await }
                })
                .await;
        }
    }

    pub fn rpc_server(&self) -> &RpcServer {
        &self.rpc_server
    }

    /// Binds the configured address and serves until the listener closes.
    pub async fn serve(mut self) -> Result<(), RpcError> {
        self.register_all().await;
        let quic_server = self.rpc_server.bind()?;
        info!(
            addr = ?self.rpc_server.socket_addr,
            methods = ?self.rpc_server.methods().await,
            "Chat service ready"
        );
        self.rpc_server.start(quic_server).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Code, RpcRequest};

    /// Tags replies so the test can tell which method ran.
    struct Tagging;

    #[async_trait]
    impl ChatHandler for Tagging {
        async fn join(&self, request: ChatMessage) -> Result<ChatMessage, Status> {
            Ok(ChatMessage::new(request.user, "joined"))
        }

        async fn send(&self, request: ChatMessage) -> Result<ChatMessage, Status> {
            if request.text.is_empty() {
                return Err(Status::invalid_argument("text must not be empty"));
            }
            Ok(ChatMessage::new(request.user, "sent"))
        }
    }

    async fn call(
        server: &ChatServer<Tagging>,
        method: &str,
        msg: &ChatMessage,
    ) -> Result<ChatMessage, RpcError> {
        let params = bincode::serialize(msg).unwrap();
        let bytes = server
            .rpc_server()
            .dispatch(RpcRequest::new(1, method, params))
            .await
            .into_result()?;
        Ok(bincode::deserialize(&bytes)?)
    }

    #[tokio::test]
    async fn register_all_routes_join_and_send_separately() {
        let mut server = ChatServer::new(Tagging, RpcConfig::new("cert.pem", "127.0.0.1:0"));
        server.register_all().await;
        assert_eq!(server.rpc_server().methods().await, vec![JOIN, SEND]);

        let msg = ChatMessage::new("bob", "hey");
        assert_eq!(call(&server, JOIN, &msg).await.unwrap().text, "joined");
        assert_eq!(call(&server, SEND, &msg).await.unwrap().text, "sent");
    }

    #[tokio::test]
    async fn handler_status_is_forwarded() {
        let mut server = ChatServer::new(Tagging, RpcConfig::new("cert.pem", "127.0.0.1:0"));
        server.register_all().await;

        let err = call(&server, SEND, &ChatMessage::new("bob", ""))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(Code::InvalidArgument));
    }
}
