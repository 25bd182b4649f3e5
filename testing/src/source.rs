//! Channel-backed message source.

use order_ingest_core::{InboundMessage, MessageSource, SourceError};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// In-memory message source for consumer tests.
///
/// Messages pushed with [`push`](Self::push) are handed out in order. Once
/// [`close`](Self::close) has been called and the queue is drained,
/// `next_message` returns [`SourceError::Closed`]; until then it blocks, like a
/// broker with no new messages.
///
/// Every acknowledgment is recorded and can be inspected with
/// [`acknowledged`](Self::acknowledged).
#[derive(Clone)]
pub struct InMemoryMessageSource {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<InboundMessage>>>>,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<InboundMessage>>>,
    acknowledged: Arc<Mutex<Vec<InboundMessage>>>,
    fail_acks: Arc<Mutex<bool>>,
}

impl InMemoryMessageSource {
    /// Create an empty, open source.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: Arc::new(Mutex::new(Some(tx))),
            receiver: Arc::new(tokio::sync::Mutex::new(rx)),
            acknowledged: Arc::new(Mutex::new(Vec::new())),
            fail_acks: Arc::new(Mutex::new(false)),
        }
    }

    /// Create a source preloaded with `messages` and already closed.
    #[must_use]
    pub fn with_messages(messages: impl IntoIterator<Item = InboundMessage>) -> Self {
        let source = Self::new();
        for message in messages {
            source.push(message);
        }
        source.close();
        source
    }

    /// Enqueue a message.
    ///
    /// # Panics
    ///
    /// Panics if the source has been closed.
    pub fn push(&self, message: InboundMessage) {
        self.sender
            .lock()
            .unwrap()
            .as_ref()
            .expect("cannot push to a closed source")
            .send(message)
            .unwrap();
    }

    /// Stop accepting messages; `next_message` returns `Closed` once drained.
    pub fn close(&self) {
        self.sender.lock().unwrap().take();
    }

    /// Make acknowledgments fail (or succeed again).
    pub fn set_fail_acks(&self, fail: bool) {
        *self.fail_acks.lock().unwrap() = fail;
    }

    /// Messages acknowledged so far, in order.
    #[must_use]
    pub fn acknowledged(&self) -> Vec<InboundMessage> {
        self.acknowledged.lock().unwrap().clone()
    }

    /// Offsets acknowledged so far, in order.
    #[must_use]
    pub fn acknowledged_offsets(&self) -> Vec<i64> {
        self.acknowledged
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.offset)
            .collect()
    }
}

impl Default for InMemoryMessageSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSource for InMemoryMessageSource {
    fn next_message(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<InboundMessage, SourceError>> + Send + '_>> {
        Box::pin(async move {
            let mut receiver = self.receiver.lock().await;
            receiver.recv().await.ok_or(SourceError::Closed)
        })
    }

    fn acknowledge<'a>(
        &'a self,
        message: &'a InboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if *self.fail_acks.lock().unwrap() {
                return Err(SourceError::Acknowledge {
                    topic: message.topic.clone(),
                    partition: message.partition,
                    offset: message.offset,
                    reason: "injected commit failure".to_string(),
                });
            }
            self.acknowledged.lock().unwrap().push(message.clone());
            Ok(())
        })
    }
}
