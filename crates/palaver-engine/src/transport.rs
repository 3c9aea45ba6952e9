//! Model transport seam.
//!
//! The engine does not know the provider's wire protocol. A transport opens
//! a stream of events for a payload and can be asked to abort it.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use palaver_common::StreamId;

use crate::assembler::Payload;
use crate::token_accountant::UsageReport;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("rate limited")]
    RateLimited,
    #[error("timeout")]
    Timeout,
}

/// One item of a model response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Fragment(String),
    Usage(UsageReport),
    Error(TransportError),
}

/// A stream opened by a transport, with the handle used to abort it.
pub struct OpenedStream {
    pub id: StreamId,
    pub events: BoxStream<'static, TransportEvent>,
}

impl OpenedStream {
    pub fn new(events: BoxStream<'static, TransportEvent>) -> Self {
        Self {
            id: StreamId::new(),
            events,
        }
    }
}

#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Open a response stream. Fails when the request cannot be set up.
    async fn open_stream(
        &self,
        payload: &Payload,
        model_id: &str,
    ) -> Result<OpenedStream, TransportError>;

    /// Best-effort request to stop producing events for `stream`.
    fn abort(&self, stream: &StreamId);
}
