//! Session implementations: the duplex (bidirectional streaming) session
//! and its lighter unary sibling.

mod duplex;
mod unary;

pub use duplex::{DuplexSession, DuplexSessionConfig, ImageFrame, VideoChunk};
pub use unary::{UnarySession, UnarySessionConfig};

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, Notify};

use duplex_runtime_types::SessionChunk;

use crate::error::SessionError;
use crate::statestore::{ConversationState, StateStore};

pub(crate) fn generate_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Seeds empty conversation state when the store has none for this id.
/// A load failure is treated as "no state yet" rather than fatal.
pub(crate) async fn init_conversation_state(
    store: &Arc<dyn StateStore>,
    conversation_id: &str,
    user_id: Option<String>,
    metadata: HashMap<String, serde_json::Value>,
) -> Result<(), SessionError> {
    if store.load(conversation_id).await.is_err() {
        let initial = ConversationState {
            id: conversation_id.to_string(),
            user_id,
            messages: Vec::new(),
            metadata,
        };
        store.save(&initial).await?;
    }
    Ok(())
}

/// Fires once the consumer of a response stream has read it to the end.
#[derive(Debug, Default)]
pub(crate) struct DrainSignal {
    drained: AtomicBool,
    notify: Notify,
}

impl DrainSignal {
    pub(crate) fn mark(&self) {
        self.drained.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub(crate) async fn wait(&self) {
        loop {
            if self.drained.load(Ordering::Acquire) {
                return;
            }
            let notified = self.notify.notified();
            // Re-check after registering to close the window between the
            // load and notify_waiters.
            if self.drained.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

/// The output side of a session: a stream of [`SessionChunk`]s that ends
/// exactly once, when pipeline execution has finished producing output.
pub struct ResponseStream {
    rx: Option<mpsc::Receiver<SessionChunk>>,
    drained: Arc<DrainSignal>,
}

impl ResponseStream {
    pub(crate) fn new(rx: mpsc::Receiver<SessionChunk>, drained: Arc<DrainSignal>) -> Self {
        Self {
            rx: Some(rx),
            drained,
        }
    }

    /// A stream that is already exhausted. Returned when the live stream
    /// has been handed out previously.
    pub(crate) fn finished() -> Self {
        Self {
            rx: None,
            drained: Arc::new(DrainSignal::default()),
        }
    }

    /// Receives the next chunk, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<SessionChunk> {
        let rx = self.rx.as_mut()?;
        match rx.recv().await {
            Some(chunk) => Some(chunk),
            None => {
                self.rx = None;
                self.drained.mark();
                None
            }
        }
    }
}

impl futures::Stream for ResponseStream {
    type Item = SessionChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Ready(None);
        };
        match rx.poll_recv(cx) {
            Poll::Ready(None) => {
                self.rx = None;
                self.drained.mark();
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_signal_resolves_after_mark() {
        let signal = Arc::new(DrainSignal::default());
        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.wait().await })
        };
        signal.mark();
        waiter.await.expect("waiter completes");
    }

    #[tokio::test]
    async fn response_stream_marks_drained_on_exhaustion() {
        let (tx, rx) = mpsc::channel(4);
        let drained = Arc::new(DrainSignal::default());
        let mut stream = ResponseStream::new(rx, Arc::clone(&drained));

        tx.send(SessionChunk::text("one")).await.expect("send");
        drop(tx);

        assert_eq!(stream.recv().await.expect("chunk").content, "one");
        assert!(stream.recv().await.is_none());
        drained.wait().await;

        // Subsequent reads stay exhausted.
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn finished_stream_is_empty() {
        let mut stream = ResponseStream::finished();
        assert!(stream.recv().await.is_none());
    }
}
