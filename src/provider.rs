//! Provider capability contracts consumed by sessions.
//!
//! Streaming support is an explicit capability interface rather than a
//! runtime type assertion: a provider that can host signal-based duplex
//! sessions overrides [`Provider::stream_input`] to hand out its
//! [`StreamInputSupport`] handle, and capability mismatches become
//! construction-time errors.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use duplex_runtime_types::{DuplexConfig, Message, SessionChunk};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("provider call failed: {0}")]
    Call(String),

    #[error("streaming session failed: {0}")]
    Streaming(String),
}

#[derive(Debug, Clone, Default)]
pub struct PredictionRequest {
    pub messages: Vec<Message>,
    /// Template variables resolved for this call.
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct PredictionResponse {
    pub message: Message,
}

/// A generative-model backend.
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> &str;

    async fn predict(&self, request: PredictionRequest)
        -> Result<PredictionResponse, ProviderError>;

    /// The provider's streaming-input capability, if it has one. Signal-based
    /// duplex sessions refuse to construct when this returns `None`.
    fn stream_input(self: Arc<Self>) -> Option<Arc<dyn StreamInputSupport>> {
        None
    }
}

/// Capability of creating long-lived streaming sessions against the
/// backend. Named for the capability it grants; construction errors refer
/// to it by this name.
#[async_trait]
pub trait StreamInputSupport: Send + Sync {
    async fn create_stream_session(
        &self,
        config: &DuplexConfig,
    ) -> Result<Box<dyn StreamInputSession>, ProviderError>;
}

/// A live streaming session against the backend: the same symmetric shape a
/// duplex session exposes to its own callers, one layer down.
#[async_trait]
pub trait StreamInputSession: Send + Sync {
    async fn send_chunk(&self, chunk: SessionChunk) -> Result<(), ProviderError>;

    async fn send_text(&self, text: &str) -> Result<(), ProviderError>;

    /// Next response chunk, or `None` once the backend stream ends.
    async fn recv(&mut self) -> Option<SessionChunk>;

    async fn close(&mut self) -> Result<(), ProviderError>;

    fn error(&self) -> Option<ProviderError>;

    /// Resolves when the backend session has ended.
    async fn done(&mut self);
}
