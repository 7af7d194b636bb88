//! Contract between sessions and the stage pipeline they drive.
//!
//! A pipeline is opaque to the session: it consumes a stream of
//! [`PipelineElement`]s and produces a stream of them back. Prompt
//! assembly, provider invocation, turn detection and synthesis all live
//! behind this trait.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::mpsc;

use duplex_runtime_types::{DuplexConfig, Message, PipelineElement};

use crate::provider::{Provider, StreamInputSupport};
use crate::statestore::StateStore;

/// Capacity of the bounded input and output queues a session wires to its
/// pipeline. Sends block once the queue is full.
pub const STREAM_BUFFER_SIZE: usize = 100;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline construction failed: {0}")]
    Build(String),

    #[error("pipeline execution failed: {0}")]
    Execution(String),
}

/// Timing placeholder recorded for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionTrace {
    pub started_at_ms: u64,
    pub completed_at_ms: Option<u64>,
}

impl ExecutionTrace {
    pub fn started_now() -> Self {
        Self {
            started_at_ms: now_ms(),
            completed_at_ms: None,
        }
    }

    pub fn complete(&mut self) {
        self.completed_at_ms = Some(now_ms());
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Result of running a pipeline to completion through its one-shot entry
/// point.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Conversation history after the run, including the response.
    pub messages: Vec<Message>,
    /// The assistant response produced by this run, if any.
    pub response: Option<Message>,
    pub trace: ExecutionTrace,
}

/// An ordered chain of processing stages.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Runs the pipeline to completion over the given conversation history.
    /// This is the synchronous (non-duplex) entry point used by unary
    /// sessions.
    async fn execute(&self, messages: Vec<Message>) -> Result<ExecutionResult, PipelineError>;

    /// Starts streaming execution bound to `input` and returns the output
    /// stream. The output channel closes when the pipeline finishes, which
    /// a well-behaved pipeline does once `input` is exhausted.
    async fn execute_stream(
        &self,
        input: mpsc::Receiver<PipelineElement>,
    ) -> Result<mpsc::Receiver<PipelineElement>, PipelineError>;
}

/// Everything a pipeline builder needs to assemble a pipeline for one
/// conversation.
#[derive(Clone)]
pub struct PipelineBuildContext {
    pub provider: Arc<dyn Provider>,
    /// Present only in signal-based (ASM) mode; the pipeline is expected to
    /// create its provider session lazily from this handle.
    pub stream_provider: Option<Arc<dyn StreamInputSupport>>,
    /// Present only in signal-based (ASM) mode.
    pub streaming: Option<DuplexConfig>,
    pub conversation_id: String,
    pub store: Arc<dyn StateStore>,
}

/// Builds a pipeline for a session. In silence-based (VAD) mode the stream
/// provider handle is `None` and the pipeline performs turn detection and
/// one-shot provider calls internally.
pub type PipelineBuilder =
    Arc<dyn Fn(PipelineBuildContext) -> Result<Arc<dyn Pipeline>, PipelineError> + Send + Sync>;
