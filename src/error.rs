use duplex_runtime_types::ConfigError;

use crate::pipeline::PipelineError;
use crate::statestore::StateStoreError;

/// Errors returned synchronously by session operations.
///
/// Only construction, send and fork failures surface here. Failures that
/// occur while the pipeline is running are delivered as chunks on the
/// response stream instead (error field plus finish reason), so stream
/// consumers never need to poll a second error source.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid session configuration: {0}")]
    Config(String),

    #[error("invalid duplex configuration: {0}")]
    DuplexConfig(#[from] ConfigError),

    #[error("session is closed")]
    Closed,

    #[error("chunk must carry media or text content")]
    EmptyChunk,

    #[error("frame data is required")]
    EmptyFrame,

    #[error("video chunk data is required")]
    EmptyVideoChunk,

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to build pipeline: {0}")]
    PipelineBuild(#[source] PipelineError),

    #[error("failed to execute pipeline: {0}")]
    PipelineExecution(#[source] PipelineError),

    #[error("failed to fork state from {from_id} to {to_id}: {source}")]
    Fork {
        from_id: String,
        to_id: String,
        #[source]
        source: StateStoreError,
    },

    #[error("state store error: {0}")]
    Store(#[from] StateStoreError),
}
