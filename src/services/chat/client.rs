use super::types::*;
use crate::{RpcClient, RpcConfig, RpcError};
use std::net::SocketAddr;

/// Client for calling `Chat` methods.
pub struct ChatClient {
    inner: RpcClient,
}

impl ChatClient {
    pub async fn connect(addr: SocketAddr, config: RpcConfig) -> Result<Self, RpcError> {
        let inner = RpcClient::connect(addr, config).await?;
        Ok(Self { inner })
    }

    pub fn from_rpc_client(inner: RpcClient) -> Self {
        Self { inner }
    }

    pub async fn join(&self, request: ChatMessage) -> Result<ChatMessage, RpcError> {
        self.inner.call_typed(JOIN, &request).await
    }

    pub async fn send(&self, request: ChatMessage) -> Result<ChatMessage, RpcError> {
        self.inner.call_typed(SEND, &request).await
    }
}
