//! The boundary between the invocation layer and a physical channel.

use async_trait::async_trait;
use npc_ipc::MessageEnvelope;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("transport codec error: {0}")]
    Codec(String),
}

/// Carries envelopes to the side that owns the procedures
///
/// `exchange` must be cancel-safe: dropping its future before it resolves
/// must release whatever the transport holds for that request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and waits for the response correlated to it
    async fn exchange(&self, request: MessageEnvelope) -> Result<MessageEnvelope, TransportError>;

    /// Sends a one-way message
    async fn notify(&self, message: MessageEnvelope) -> Result<(), TransportError>;
}
