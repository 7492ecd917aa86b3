use super::types::*;
use crate::{RpcConfig, RpcError, RpcServer, Status};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Handler trait that implementations of the `Greeter` service provide.
#[async_trait]
pub trait GreeterHandler: Send + Sync + 'static {
    async fn say_hello(&self, request: IdentityRequest) -> Result<IdentityReply, Status>;
}

/// Server that registers a [`GreeterHandler`] with an [`RpcServer`].
pub struct GreeterServer<H: GreeterHandler> {
    handler: Arc<H>,
    rpc_server: RpcServer,
}

impl<H: GreeterHandler> GreeterServer<H> {
    pub fn new(handler: H, config: RpcConfig) -> Self {
        Self {
            handler: Arc::new(handler),
            rpc_server: RpcServer::new(config),
        }
    }

    /// Registers all service methods with the RPC server.
    pub async fn register_all(&mut self) {
        let handler = self.handler.clone();
        self.rpc_server
            .register_typed(SAY_HELLO, move |request: IdentityRequest| {
                let handler = handler.clone();
                async move { handler.say_hello(request).await }
            })
            .await;
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
            "Greeter service ready"
        );
        self.rpc_server.start(quic_server).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Code, RpcRequest};

    struct Fixed;

    #[async_trait]
    impl GreeterHandler for Fixed {
        async fn say_hello(&self, request: IdentityRequest) -> Result<IdentityReply, Status> {
            Ok(IdentityReply::greeting(&request.id.to_uppercase()))
        }
    }

    #[tokio::test]
    async fn register_all_routes_say_hello() {
        let mut server = GreeterServer::new(Fixed, RpcConfig::new("cert.pem", "127.0.0.1:0"));
        server.register_all().await;
        assert_eq!(server.rpc_server().methods().await, vec![SAY_HELLO]);

        let params = bincode::serialize(&IdentityRequest::new("ada")).unwrap();
        let bytes = server
            .rpc_server()
            .dispatch(RpcRequest::new(1, SAY_HELLO, params))
            .await
            .into_result()
            .unwrap();
        let reply: IdentityReply = bincode::deserialize(&bytes).unwrap();
        assert_eq!(reply.message, "Hello, ADA");
    }

    #[tokio::test]
    async fn malformed_request_is_invalid_argument() {
        let mut server = GreeterServer::new(Fixed, RpcConfig::new("cert.pem", "127.0.0.1:0"));
        server.register_all().await;

        let err = server
            .rpc_server()
            .dispatch(RpcRequest::new(1, SAY_HELLO, vec![0xff]))
            .await
            .into_result()
            .unwrap_err();
        assert_eq!(err.code(), Some(Code::InvalidArgument));
    }
}
