//! Conversation state persistence contract and the default in-memory store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use duplex_runtime_types::Message;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateStoreError {
    #[error("conversation {0} not found")]
    NotFound(String),

    #[error("state store backend error: {0}")]
    Backend(String),
}

/// Persisted state of one conversation.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConversationState {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Stores, loads and forks conversation state keyed by conversation id.
/// Implementations are responsible for their own concurrency safety.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<ConversationState, StateStoreError>;

    async fn save(&self, state: &ConversationState) -> Result<(), StateStoreError>;

    /// Copies the state stored under `from_id` to `to_id`, leaving the
    /// source untouched.
    async fn fork(&self, from_id: &str, to_id: &str) -> Result<(), StateStoreError>;
}

/// In-memory state store used when a session is constructed without one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    states: RwLock<HashMap<String, ConversationState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<ConversationState, StateStoreError> {
        self.states
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StateStoreError::NotFound(id.to_string()))
    }

    async fn save(&self, state: &ConversationState) -> Result<(), StateStoreError> {
        self.states
            .write()
            .insert(state.id.clone(), state.clone());
        Ok(())
    }

    async fn fork(&self, from_id: &str, to_id: &str) -> Result<(), StateStoreError> {
        let mut states = self.states.write();
        let mut forked = states
            .get(from_id)
            .cloned()
            .ok_or_else(|| StateStoreError::NotFound(from_id.to_string()))?;
        forked.id = to_id.to_string();
        states.insert(to_id.to_string(), forked);
        Ok(())
    }
}
