use super::types::*;
use crate::{RpcClient, RpcConfig, RpcError};
use std::net::SocketAddr;

/// Client for calling `Greeter` methods.
pub struct GreeterClient {
    inner: RpcClient,
}

impl GreeterClient {
    pub async fn connect(addr: SocketAddr, config: RpcConfig) -> Result<Self, RpcError> {
        let inner = RpcClient::connect(addr, config).await?;
        Ok(Self { inner })
    }

    pub fn from_rpc_client(inner: RpcClient) -> Self {
        Self { inner }
    }

    pub async fn say_hello(&self, request: IdentityRequest) -> Result<IdentityReply, RpcError> {
        self.inner.call_typed(SAY_HELLO, &request).await
    }
}
