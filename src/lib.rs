//! Duplex session runtime: live bidirectional conversations with
//! generative-model backends over a stage pipeline.
//!
//! [`DuplexSession`] streams caller chunks into a pipeline and streams the
//! pipeline's output back; [`UnarySession`] is the request/response sibling
//! over the same conversation model.

pub mod convert;
mod error;
pub mod pipeline;
pub mod provider;
mod session;
pub mod statestore;

pub use duplex_runtime_types as types;

pub use error::SessionError;
pub use pipeline::{
    ExecutionResult, ExecutionTrace, Pipeline, PipelineBuildContext, PipelineBuilder,
    PipelineError, STREAM_BUFFER_SIZE,
};
pub use provider::{
    PredictionRequest, PredictionResponse, Provider, ProviderError, StreamInputSession,
    StreamInputSupport,
};
pub use session::{
    DuplexSession, DuplexSessionConfig, ImageFrame, ResponseStream, UnarySession,
    UnarySessionConfig, VideoChunk,
};
pub use statestore::{ConversationState, MemoryStore, StateStore, StateStoreError};
