//! Kafka-backed [`MessageSource`].

use crate::group::GroupIdentity;
use order_ingest_core::{InboundMessage, MessageSource, SourceError};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default topic carrying order payloads.
pub const DEFAULT_TOPIC: &str = "orders";

/// Message source over a single Kafka topic with manual offset commits.
///
/// Auto-commit is disabled: an offset is committed only when the consumer calls
/// [`acknowledge`](MessageSource::acknowledge), after the order is durable. Kafka
/// commits are cumulative per partition, so acknowledging offset `n` also covers
/// every earlier offset of that partition.
///
/// # Example
///
/// ```no_run
/// use order_ingest_redpanda::{GroupIdentity, KafkaOrderSource};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = KafkaOrderSource::builder()
///     .brokers("localhost:9092")
///     .topic("orders")
///     .group(GroupIdentity::Fixed("orders-service".to_string()))
///     .build()?;
/// println!("consuming as {}", source.group_id());
/// # Ok(())
/// # }
/// ```
pub struct KafkaOrderSource {
    consumer: StreamConsumer,
    topic: String,
    group_id: String,
}

impl KafkaOrderSource {
    /// Create a new builder for configuring the source.
    #[must_use]
    pub fn builder() -> KafkaOrderSourceBuilder {
        KafkaOrderSourceBuilder::default()
    }

    /// Topic being consumed.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Resolved consumer group id.
    #[must_use]
    pub fn group_id(&self) -> &str {
        &self.group_id
    }
}

/// Builder for configuring a [`KafkaOrderSource`].
#[derive(Default)]
pub struct KafkaOrderSourceBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    group: Option<GroupIdentity>,
    auto_offset_reset: Option<String>,
    session_timeout: Option<Duration>,
}

impl KafkaOrderSourceBuilder {
    /// Set the broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the topic to consume (default: `orders`).
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the consumer group identity (default: ephemeral).
    #[must_use]
    pub fn group(mut self, group: GroupIdentity) -> Self {
        self.group = Some(group);
        self
    }

    /// Set where a group without committed offsets starts reading.
    ///
    /// `"earliest"` (default) or `"latest"`.
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Set the group session timeout (default: 45 seconds).
    #[must_use]
    pub const fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Build the source: create the consumer and subscribe to the topic.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Connection`] if brokers are not set, the consumer
    /// cannot be created or the subscription fails.
    pub fn build(self) -> Result<KafkaOrderSource, SourceError> {
        let brokers = self
            .brokers
            .ok_or_else(|| SourceError::Connection("Brokers not configured".to_string()))?;
        let topic = self.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        let group_id = self.group.unwrap_or_default().resolve();
        let auto_offset_reset = self
            .auto_offset_reset
            .unwrap_or_else(|| "earliest".to_string());
        let session_timeout = self.session_timeout.unwrap_or(Duration::from_secs(45));

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &auto_offset_reset)
            .set("session.timeout.ms", session_timeout.as_millis().to_string())
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| SourceError::Connection(format!("Failed to create consumer: {e}")))?;

        consumer.subscribe(&[topic.as_str()]).map_err(|e| {
            SourceError::Connection(format!("Failed to subscribe to {topic}: {e}"))
        })?;

        tracing::info!(
            brokers = %brokers,
            topic = %topic,
            consumer_group = %group_id,
            auto_offset_reset = %auto_offset_reset,
            manual_commit = true,
            "Subscribed to order topic"
        );

        Ok(KafkaOrderSource {
            consumer,
            topic,
            group_id,
        })
    }
}

impl MessageSource for KafkaOrderSource {
    fn next_message(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<InboundMessage, SourceError>> + Send + '_>> {
        Box::pin(async move {
            let message = self
                .consumer
                .recv()
                .await
                .map_err(|e| SourceError::Receive(e.to_string()))?;

            tracing::trace!(
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                "Received message"
            );

            // A message without a payload is passed on empty and fails decoding.
            Ok(InboundMessage {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(<[u8]>::to_vec),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            })
        })
    }

    fn acknowledge<'a>(
        &'a self,
        message: &'a InboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let commit_error = |reason: String| SourceError::Acknowledge {
                topic: message.topic.clone(),
                partition: message.partition,
                offset: message.offset,
                reason,
            };

            // The committed offset is the next one to read.
            let mut offsets = TopicPartitionList::new();
            offsets
                .add_partition_offset(
                    &message.topic,
                    message.partition,
                    Offset::Offset(message.offset + 1),
                )
                .map_err(|e| commit_error(e.to_string()))?;

            self.consumer
                .commit(&offsets, CommitMode::Async)
                .map_err(|e| commit_error(e.to_string()))?;

            tracing::debug!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "Offset committed"
            );
            Ok(())
        })
    }
}
