//! Order publisher for feeding the ingest topic.

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use thiserror::Error;

/// Errors from publishing.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The producer could not be created.
    #[error("Failed to create producer: {0}")]
    Producer(String),

    /// The broker did not accept the message.
    #[error("Failed to publish to {topic}: {reason}")]
    Send {
        /// Topic the message was sent to
        topic: String,
        /// Underlying failure
        reason: String,
    },
}

/// Publishes raw order payloads to a topic.
///
/// # Example
///
/// ```no_run
/// use order_ingest_redpanda::KafkaOrderPublisher;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let publisher = KafkaOrderPublisher::new("localhost:9092", "orders")?;
/// let (partition, offset) = publisher.publish("b563feb7b2b84b6test", b"{}").await?;
/// # Ok(())
/// # }
/// ```
pub struct KafkaOrderPublisher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaOrderPublisher {
    /// Create a publisher for `topic` with a 5 second send timeout.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Producer`] if the producer cannot be created.
    pub fn new(brokers: &str, topic: impl Into<String>) -> Result<Self, PublishError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()
            .map_err(|e| PublishError::Producer(e.to_string()))?;

        Ok(Self {
            producer,
            topic: topic.into(),
            timeout: Duration::from_secs(5),
        })
    }

    /// Set the send timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Topic messages are published to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish one payload keyed by `key` and return its `(partition, offset)`.
    ///
    /// Keying by order id keeps every version of an order on one partition, so
    /// they are consumed in publish order.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Send`] if delivery fails or times out.
    pub async fn publish(&self, key: &str, payload: &[u8]) -> Result<(i32, i64), PublishError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                tracing::debug!(
                    topic = %self.topic,
                    partition,
                    offset,
                    key,
                    "Order published"
                );
                Ok((partition, offset))
            }
            Err((kafka_error, _)) => {
                tracing::error!(topic = %self.topic, error = %kafka_error, "Failed to publish order");
                Err(PublishError::Send {
                    topic: self.topic.clone(),
                    reason: kafka_error.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publisher_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<KafkaOrderPublisher>();
        assert_sync::<KafkaOrderPublisher>();
    }
}
