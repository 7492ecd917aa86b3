//! Seams over the `s2n-quic` types so the server loop and the client call
//! path can be driven by in-memory streams in tests.

use async_trait::async_trait;
use bytes::Bytes;

use crate::RpcError;

#[async_trait]
pub(crate) trait QuicStreamAdapter: Send {
    async fn send_bytes(&mut self, data: Bytes) -> Result<(), RpcError>;
    async fn receive_bytes(&mut self) -> Result<Option<Bytes>, RpcError>;
    /// Marks the sending half complete once everything queued is delivered.
    fn finish_send(&mut self) -> Result<(), RpcError>;
}

#[async_trait]
impl QuicStreamAdapter for s2n_quic::stream::BidirectionalStream {
    async fn send_bytes(&mut self, data: Bytes) -> Result<(), RpcError> {
        self.send(data)
            .await
            .map_err(|err| RpcError::StreamError(err.to_string()))
    }

    async fn receive_bytes(&mut self) -> Result<Option<Bytes>, RpcError> {
        self.receive()
            .await
            .map_err(|err| RpcError::StreamError(err.to_string()))
    }

    fn finish_send(&mut self) -> Result<(), RpcError> {
        self.finish()
            .map_err(|err| RpcError::StreamError(err.to_string()))
    }
}

/// Client side: opens one stream per call.
#[async_trait]
pub(crate) trait QuicConnectionAdapter: Send + Sync {
    async fn open_bidirectional_stream(
        &mut self,
    ) -> Result<Box<dyn QuicStreamAdapter + Send>, RpcError>;
}

#[async_trait]
impl QuicConnectionAdapter for s2n_quic::Connection {
    async fn open_bidirectional_stream(
        &mut self,
    ) -> Result<Box<dyn QuicStreamAdapter + Send>, RpcError> {
        let stream = s2n_quic::Connection::open_bidirectional_stream(self)
            .await
            .map_err(|e| RpcError::StreamError(e.to_string()))?;
        Ok(Box::new(stream))
    }
}

/// Server side: yields the streams a peer opens on one connection.
#[async_trait]
pub(crate) trait QuicServerConnectionAdapter: Send {
    async fn accept_bidirectional_stream(
        &mut self,
    ) -> Result<Option<Box<dyn QuicStreamAdapter + Send>>, RpcError>;
}

#[async_trait]
impl QuicServerConnectionAdapter for s2n_quic::Connection {
    async fn accept_bidirectional_stream(
        &mut self,
    ) -> Result<Option<Box<dyn QuicStreamAdapter + Send>>, RpcError> {
        let stream = s2n_quic::Connection::accept_bidirectional_stream(self)
            .await
            .map_err(|e| RpcError::StreamError(e.to_string()))?;
        Ok(stream.map(|s| Box::new(s) as Box<dyn QuicStreamAdapter + Send>))
    }
}

/// Listener seam; `None` once the listener is closed.
#[async_trait]
pub(crate) trait QuicServerAdapter: Send {
    async fn accept(&mut self) -> Option<Box<dyn QuicServerConnectionAdapter>>;
}

#[async_trait]
impl QuicServerAdapter for s2n_quic::Server {
    async fn accept(&mut self) -> Option<Box<dyn QuicServerConnectionAdapter>> {
        let connection = s2n_quic::Server::accept(self).await?;
        Some(Box::new(connection) as Box<dyn QuicServerConnectionAdapter>)
    }
}
