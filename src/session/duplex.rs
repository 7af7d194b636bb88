//! The duplex session: a live, bidirectional conversation with a
//! generative-model backend.
//!
//! Callers stream chunks in and read a stream of chunks back while a stage
//! pipeline runs in between. The session owns one bounded input queue and
//! one bounded output queue; pipeline execution starts lazily on the first
//! accepted input and runs exactly once for the session's lifetime.
//!
//! Two turn-taking modes share this type:
//! - signal-based (ASM): a streaming-mode configuration is present, the
//!   provider must expose its stream-input capability, and the pipeline
//!   holds one long-running provider session;
//! - silence-based (VAD): no streaming configuration, the pipeline detects
//!   turn boundaries locally and makes one-shot provider calls.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use duplex_runtime_types::{
    DuplexConfig, MediaContent, Message, PipelineElement, SessionChunk, FINISH_REASON_ERROR,
};

use crate::convert;
use crate::error::SessionError;
use crate::pipeline::{Pipeline, PipelineBuildContext, PipelineBuilder, STREAM_BUFFER_SIZE};
use crate::provider::Provider;
use crate::session::{
    generate_conversation_id, init_conversation_state, DrainSignal, ResponseStream,
};
use crate::statestore::{ConversationState, MemoryStore, StateStore};

/// An image frame pushed into a realtime video conversation.
#[derive(Debug, Clone, Default)]
pub struct ImageFrame {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Capture timestamp in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub frame_num: i64,
}

/// An encoded video segment pushed into a realtime video conversation.
#[derive(Debug, Clone, Default)]
pub struct VideoChunk {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Capture timestamp in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub chunk_index: i64,
    pub is_key_frame: bool,
}

/// Inputs for [`DuplexSession::new`]. `pipeline_builder` and `provider`
/// are required; everything else has a sensible default.
#[derive(Clone, Default)]
pub struct DuplexSessionConfig {
    /// Conversation id; generated when absent or empty.
    pub conversation_id: Option<String>,
    pub user_id: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    /// Initial template variables, copied into the session.
    pub variables: HashMap<String, String>,
    /// Present selects signal-based (ASM) mode; absent selects
    /// silence-based (VAD) mode.
    pub streaming: Option<DuplexConfig>,
    /// Defaults to a fresh in-memory store.
    pub state_store: Option<Arc<dyn StateStore>>,
    pub provider: Option<Arc<dyn Provider>>,
    pub pipeline_builder: Option<PipelineBuilder>,
    /// Cancels in-flight sends and the execution worker. Defaults to a
    /// token nobody cancels.
    pub cancellation: Option<CancellationToken>,
}

/// One-time-start lifecycle of the pipeline worker. The Idle variant owns
/// the queue ends the worker takes over on first send.
enum ExecState {
    Idle {
        input_rx: mpsc::Receiver<PipelineElement>,
        output_tx: mpsc::Sender<SessionChunk>,
    },
    Running,
    Closed,
}

struct Gate {
    state: ExecState,
    input_tx: Option<mpsc::Sender<PipelineElement>>,
}

pub struct DuplexSession {
    id: String,
    store: Arc<dyn StateStore>,
    provider: Arc<dyn Provider>,
    pipeline: Arc<dyn Pipeline>,
    variables: RwLock<HashMap<String, String>>,
    gate: Mutex<Gate>,
    output_rx: Mutex<Option<mpsc::Receiver<SessionChunk>>>,
    drained: Arc<DrainSignal>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for DuplexSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexSession")
            .field("id", &self.id)
            .field("provider", &self.provider.id())
            .finish_non_exhaustive()
    }
}

impl DuplexSession {
    /// Builds a duplex session around a freshly constructed pipeline.
    ///
    /// Initializes conversation state in the store when none exists for
    /// the id. In signal-based mode the provider must expose its
    /// stream-input capability or construction fails.
    pub async fn new(config: DuplexSessionConfig) -> Result<Self, SessionError> {
        let pipeline_builder = config
            .pipeline_builder
            .ok_or_else(|| SessionError::Config("pipeline builder is required".to_string()))?;
        let provider = config
            .provider
            .ok_or_else(|| SessionError::Config("provider is required".to_string()))?;

        let conversation_id = match config.conversation_id {
            Some(id) if !id.is_empty() => id,
            _ => generate_conversation_id(),
        };

        let store: Arc<dyn StateStore> = config
            .state_store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        init_conversation_state(&store, &conversation_id, config.user_id, config.metadata).await?;

        let stream_provider = match &config.streaming {
            Some(streaming) => {
                streaming.validate()?;
                let handle = Arc::clone(&provider).stream_input().ok_or_else(|| {
                    SessionError::Config(
                        "provider must implement StreamInputSupport for signal-based (asm) mode"
                            .to_string(),
                    )
                })?;
                Some(handle)
            }
            None => None,
        };

        let pipeline = (pipeline_builder)(PipelineBuildContext {
            provider: Arc::clone(&provider),
            stream_provider,
            streaming: config.streaming,
            conversation_id: conversation_id.clone(),
            store: Arc::clone(&store),
        })
        .map_err(SessionError::PipelineBuild)?;

        let (input_tx, input_rx) = mpsc::channel(STREAM_BUFFER_SIZE);
        let (output_tx, output_rx) = mpsc::channel(STREAM_BUFFER_SIZE);

        Ok(Self {
            id: conversation_id,
            store,
            provider,
            pipeline,
            variables: RwLock::new(config.variables),
            gate: Mutex::new(Gate {
                state: ExecState::Idle {
                    input_rx,
                    output_tx,
                },
                input_tx: Some(input_tx),
            }),
            output_rx: Mutex::new(Some(output_rx)),
            drained: Arc::new(DrainSignal::default()),
            cancel: config.cancellation.unwrap_or_default(),
        })
    }

    /// The session's conversation id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The state store this session reads and writes through.
    pub fn state_store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Sends one chunk into the session.
    ///
    /// The first accepted chunk starts pipeline execution in the
    /// background; later chunks reuse the running worker. The call blocks
    /// on queue backpressure until the element is accepted or the
    /// session's cancellation token fires. No chunk is silently dropped on
    /// a live session.
    pub async fn send_chunk(&self, chunk: &SessionChunk) -> Result<(), SessionError> {
        let input_tx = self.admit(chunk)?;
        let elem = convert::chunk_to_element(chunk);

        tokio::select! {
            res = input_tx.send(elem) => res.map_err(|_| SessionError::Closed),
            _ = self.cancel.cancelled() => Err(SessionError::Cancelled),
        }
    }

    /// Checks the lifecycle, spawns the pipeline worker on first use, and
    /// hands back the input queue.
    fn admit(&self, chunk: &SessionChunk) -> Result<mpsc::Sender<PipelineElement>, SessionError> {
        let mut gate = self.gate.lock();
        if matches!(gate.state, ExecState::Closed) {
            return Err(SessionError::Closed);
        }
        if !chunk.has_input_content() {
            return Err(SessionError::EmptyChunk);
        }
        if matches!(gate.state, ExecState::Idle { .. }) {
            if let ExecState::Idle {
                input_rx,
                output_tx,
            } = mem::replace(&mut gate.state, ExecState::Running)
            {
                let pipeline = Arc::clone(&self.pipeline);
                let cancel = self.cancel.clone();
                tokio::spawn(execute_pipeline(pipeline, input_rx, output_tx, cancel));
            }
        }
        gate.input_tx.clone().ok_or(SessionError::Closed)
    }

    /// Sends text content.
    pub async fn send_text(&self, text: &str) -> Result<(), SessionError> {
        self.send_chunk(&SessionChunk::text(text)).await
    }

    /// Sends an image frame for realtime video scenarios.
    pub async fn send_frame(&self, frame: &ImageFrame) -> Result<(), SessionError> {
        if frame.data.is_empty() {
            return Err(SessionError::EmptyFrame);
        }
        let chunk = SessionChunk {
            media_delta: Some(MediaContent::new(frame.mime_type.clone(), frame.data.clone())),
            metadata: HashMap::from([
                ("width".to_string(), json!(frame.width)),
                ("height".to_string(), json!(frame.height)),
                ("timestamp_ms".to_string(), json!(frame.timestamp_ms)),
                ("frame_num".to_string(), json!(frame.frame_num)),
            ]),
            ..SessionChunk::default()
        };
        self.send_chunk(&chunk).await
    }

    /// Sends an encoded video segment.
    pub async fn send_video_chunk(&self, vchunk: &VideoChunk) -> Result<(), SessionError> {
        if vchunk.data.is_empty() {
            return Err(SessionError::EmptyVideoChunk);
        }
        let chunk = SessionChunk {
            media_delta: Some(MediaContent::new(
                vchunk.mime_type.clone(),
                vchunk.data.clone(),
            )),
            metadata: HashMap::from([
                ("width".to_string(), json!(vchunk.width)),
                ("height".to_string(), json!(vchunk.height)),
                ("timestamp_ms".to_string(), json!(vchunk.timestamp_ms)),
                ("frame_num".to_string(), json!(vchunk.chunk_index)),
                ("is_key_frame".to_string(), json!(vchunk.is_key_frame)),
            ]),
            ..SessionChunk::default()
        };
        self.send_chunk(&chunk).await
    }

    /// The session's output stream.
    ///
    /// Zero or more chunks are emitted per pipeline activation; the stream
    /// ends exactly once, when pipeline execution has finished producing
    /// output. The live stream is handed out once; later calls return an
    /// already-exhausted stream.
    pub fn response(&self) -> ResponseStream {
        match self.output_rx.lock().take() {
            Some(rx) => ResponseStream::new(rx, Arc::clone(&self.drained)),
            None => ResponseStream::finished(),
        }
    }

    /// Closes the session's input. Idempotent: the first call signals
    /// end-of-input to the pipeline, later calls are no-ops. Close never
    /// discards output already buffered for [`Self::response`].
    pub fn close(&self) -> Result<(), SessionError> {
        let mut gate = self.gate.lock();
        if matches!(gate.state, ExecState::Closed) {
            return Ok(());
        }
        // Dropping an Idle state also drops the unused output sender so a
        // never-started session still ends its response stream.
        gate.state = ExecState::Closed;
        gate.input_tx = None;
        Ok(())
    }

    /// Resolves once the response stream has been read to its end by some
    /// consumer.
    ///
    /// This signals *stream completion*, not provider or session
    /// termination: if nobody drains [`Self::response`], this never
    /// resolves.
    pub async fn done(&self) {
        self.drained.wait().await;
    }

    /// Always `None`. Run-time failures are delivered as chunks on the
    /// response stream (error field plus finish reason) so consumers watch
    /// a single channel; this accessor exists for surface symmetry with
    /// provider stream sessions.
    pub fn error(&self) -> Option<SessionError> {
        None
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

    /// Forks the conversation state to `fork_id` and builds an independent
    /// session over it: fresh queues, fresh lifecycle, copied variables,
    /// shared store and provider.
    pub async fn fork_session(
        &self,
        fork_id: &str,
        pipeline_builder: PipelineBuilder,
    ) -> Result<DuplexSession, SessionError> {
        self.store
            .fork(&self.id, fork_id)
            .await
            .map_err(|source| SessionError::Fork {
                from_id: self.id.clone(),
                to_id: fork_id.to_string(),
                source,
            })?;

        let variables = self.variables.read().clone();

        DuplexSession::new(DuplexSessionConfig {
            conversation_id: Some(fork_id.to_string()),
            state_store: Some(Arc::clone(&self.store)),
            provider: Some(Arc::clone(&self.provider)),
            pipeline_builder: Some(pipeline_builder),
            variables,
            ..DuplexSessionConfig::default()
        })
        .await
    }
}

/// The single execution worker for one session. Binds the pipeline to the
/// input queue, then forwards every produced element to the output queue as
/// a chunk. Dropping the output sender on return is what ends the response
/// stream.
async fn execute_pipeline(
    pipeline: Arc<dyn Pipeline>,
    input: mpsc::Receiver<PipelineElement>,
    output: mpsc::Sender<SessionChunk>,
    cancel: CancellationToken,
) {
    let mut elements = match pipeline.execute_stream(input).await {
        Ok(rx) => rx,
        Err(err) => {
            tracing::error!("failed to start pipeline execution: {err}");
            let _ = output.try_send(SessionChunk::error(
                err.to_string(),
                Some(FINISH_REASON_ERROR),
            ));
            return;
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("session cancelled while streaming");
                let _ = output.try_send(SessionChunk::error(
                    SessionError::Cancelled.to_string(),
                    None,
                ));
                return;
            }
            elem = elements.recv() => {
                let Some(elem) = elem else {
                    // Pipeline finished.
                    return;
                };
                let chunk = convert::element_to_chunk(elem);
                tokio::select! {
                    res = output.send(chunk) => {
                        if res.is_err() {
                            // Consumer went away; nothing left to forward to.
                            return;
                        }
                    }
                    _ = cancel.cancelled() => return,
                }
            }
        }
    }
}
