//! Message source abstraction.
//!
//! A [`MessageSource`] hands out inbound messages one at a time and accepts
//! acknowledgments for the ones that were fully processed. Delivery is
//! at-least-once: a message that is never acknowledged may be delivered again.
//!
//! # Implementations
//!
//! - `KafkaOrderSource` (in `order-ingest-redpanda`): Kafka-compatible brokers
//! - `InMemoryMessageSource` (in `order-ingest-testing`): channel-backed, for tests

use crate::error::SourceError;
use std::future::Future;
use std::pin::Pin;

/// One message as received from the broker, detached from the client library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message was read from
    pub topic: String,
    /// Partition within the topic
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Message key, if any
    pub key: Option<Vec<u8>>,
    /// Raw payload (a JSON order for the orders topic)
    pub payload: Vec<u8>,
}

impl InboundMessage {
    /// Create a message with no key.
    #[must_use]
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload,
        }
    }
}

/// Source of inbound order messages.
pub trait MessageSource: Send + Sync {
    /// Wait for the next message.
    ///
    /// This is a blocking read from the caller's point of view; callers that need
    /// cancellation race it against a shutdown signal.
    ///
    /// # Errors
    ///
    /// - [`SourceError::Receive`] for transient broker failures
    /// - [`SourceError::Closed`] when no further messages will ever arrive
    fn next_message(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<InboundMessage, SourceError>> + Send + '_>>;

    /// Acknowledge (commit) a fully processed message.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Acknowledge`] if the commit cannot be issued.
    fn acknowledge<'a>(
        &'a self,
        message: &'a InboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + 'a>>;
}
