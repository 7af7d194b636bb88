//! The unary session: request/response execution over the same pipeline,
//! state store and conversation model as the duplex session, without the
//! live streaming surface.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use duplex_runtime_types::{
    Message, PipelineElement, SessionChunk, FINISH_REASON_ERROR, FINISH_REASON_STOP,
};

use crate::error::SessionError;
use crate::pipeline::{ExecutionResult, Pipeline, STREAM_BUFFER_SIZE};
use crate::session::{
    generate_conversation_id, init_conversation_state, DrainSignal, ResponseStream,
};
use crate::statestore::{ConversationState, MemoryStore, StateStore};

/// Inputs for [`UnarySession::new`]. Only `pipeline` is required.
#[derive(Clone, Default)]
pub struct UnarySessionConfig {
    /// Conversation id; generated when absent or empty.
    pub conversation_id: Option<String>,
    pub user_id: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    /// Initial template variables, copied into the session.
    pub variables: HashMap<String, String>,
    /// Defaults to a fresh in-memory store.
    pub state_store: Option<Arc<dyn StateStore>>,
    pub pipeline: Option<Arc<dyn Pipeline>>,
}

/// A one-shot conversation handle. Each `execute*` call runs the pipeline
/// once over the stored history; state between calls lives in the store.
pub struct UnarySession {
    id: String,
    store: Arc<dyn StateStore>,
    pipeline: Arc<dyn Pipeline>,
    variables: RwLock<HashMap<String, String>>,
}

impl std::fmt::Debug for UnarySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnarySession")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl UnarySession {
    pub async fn new(config: UnarySessionConfig) -> Result<Self, SessionError> {
        let pipeline = config
            .pipeline
            .ok_or_else(|| SessionError::Config("pipeline is required".to_string()))?;

        let conversation_id = match config.conversation_id {
            Some(id) if !id.is_empty() => id,
            _ => generate_conversation_id(),
        };

        let store: Arc<dyn StateStore> = config
            .state_store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        init_conversation_state(&store, &conversation_id, config.user_id, config.metadata).await?;

        Ok(Self {
            id: conversation_id,
            store,
            pipeline,
            variables: RwLock::new(config.variables),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Runs the pipeline once over the stored conversation history.
    pub async fn execute(&self) -> Result<ExecutionResult, SessionError> {
        self.run(None).await
    }

    /// Appends `message` as a user turn, then runs the pipeline.
    pub async fn execute_with_message(
        &self,
        message: &str,
    ) -> Result<ExecutionResult, SessionError> {
        self.run(Some(message)).await
    }

    async fn run(&self, message: Option<&str>) -> Result<ExecutionResult, SessionError> {
        let mut messages = self.store.load(&self.id).await?.messages;
        if let Some(message) = message {
            messages.push(Message::user(message));
        }
        self.pipeline
            .execute(messages)
            .await
            .map_err(SessionError::PipelineExecution)
    }

    /// Runs the pipeline in streaming mode and returns an accumulating
    /// response stream: each chunk's `delta` is the increment and `content`
    /// the text accumulated so far. The final chunk carries a finish reason.
    pub async fn execute_stream(&self) -> Result<ResponseStream, SessionError> {
        self.run_stream(PipelineElement::end_of_stream()).await
    }

    /// Like [`Self::execute_stream`], with `message` fed in as the single
    /// input element.
    pub async fn execute_stream_with_message(
        &self,
        message: &str,
    ) -> Result<ResponseStream, SessionError> {
        self.run_stream(PipelineElement::text(message)).await
    }

    async fn run_stream(&self, input: PipelineElement) -> Result<ResponseStream, SessionError> {
        // Single-element, pre-closed input stream.
        let (input_tx, input_rx) = mpsc::channel(1);
        if input_tx.send(input).await.is_err() {
            return Err(SessionError::Closed);
        }
        drop(input_tx);

        let mut elements = self
            .pipeline
            .execute_stream(input_rx)
            .await
            .map_err(SessionError::PipelineExecution)?;

        let (output_tx, output_rx) = mpsc::channel(STREAM_BUFFER_SIZE);
        tokio::spawn(async move {
            let mut accumulated = String::new();
            let mut failed = false;
            while let Some(elem) = elements.recv().await {
                if elem.error.is_some() {
                    failed = true;
                }
                let mut chunk = crate::convert::element_to_chunk(elem);
                if !chunk.delta.is_empty() {
                    accumulated.push_str(&chunk.delta);
                }
                chunk.content = accumulated.clone();
                if output_tx.send(chunk).await.is_err() {
                    return;
                }
            }
            let reason = if failed {
                FINISH_REASON_ERROR
            } else {
                FINISH_REASON_STOP
            };
            let terminal = SessionChunk {
                content: accumulated,
                finish_reason: Some(reason.to_string()),
                ..SessionChunk::default()
            };
            let _ = output_tx.send(terminal).await;
        });

        Ok(ResponseStream::new(
            output_rx,
            Arc::new(DrainSignal::default()),
        ))
    }

    /// A snapshot of the session variables.
    pub fn variables(&self) -> HashMap<String, String> {
        self.variables.read().clone()
    }

    pub fn set_var(&self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.write().insert(name.into(), value.into());
    }

    pub fn get_var(&self, name: &str) -> Option<String> {
        self.variables.read().get(name).cloned()
    }

    /// Loads the conversation history from the state store.
    pub async fn messages(&self) -> Result<Vec<Message>, SessionError> {
        let state = self.store.load(&self.id).await?;
        Ok(state.messages)
    }

    /// Replaces the conversation history with an empty one.
    pub async fn clear(&self) -> Result<(), SessionError> {
        let state = ConversationState {
            id: self.id.clone(),
            ..ConversationState::default()
        };
        Ok(self.store.save(&state).await?)
    }

    /// Forks the conversation state to `fork_id` and returns an independent
    /// session over the same pipeline and store, with copied variables.
    pub async fn fork_session(&self, fork_id: &str) -> Result<UnarySession, SessionError> {
        self.store
            .fork(&self.id, fork_id)
            .await
            .map_err(|source| SessionError::Fork {
                from_id: self.id.clone(),
                to_id: fork_id.to_string(),
                source,
            })?;

        Ok(UnarySession {
            id: fork_id.to_string(),
            store: Arc::clone(&self.store),
            pipeline: Arc::clone(&self.pipeline),
            variables: RwLock::new(self.variables.read().clone()),
        })
    }
}
