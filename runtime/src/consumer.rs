//! Ingestion consumer loop.
//!
//! One task pulls messages from a [`MessageSource`] one at a time and runs each
//! through the [`IngestPipeline`]:
//!
//! ```text
//! Received → Validated → Persisted → CacheRefreshed → Acknowledged
//!                │            │
//!                └────────────┴──► not acknowledged, dead-lettered, next message
//! ```
//!
//! A message is acknowledged only after its order is durable and cached. A failed
//! message is logged, recorded in the dead letter queue when one is configured, and
//! left unacknowledged; the loop never stops because of one bad message.
//!
//! # Holding
//!
//! Committing an offset also commits every earlier one, so a failed message must
//! be settled (stored or dead-lettered) before any later message is received.
//! When neither is possible, typically because the database behind both is down,
//! the consumer holds on that message and retries it until one succeeds.
//! Without a dead letter queue, only permanent failures are skipped.
//!
//! # Shutdown
//!
//! The blocking receive is raced against a broadcast shutdown signal. A message
//! already being processed is finished before the signal is observed; a held
//! message is abandoned uncommitted and redelivered after restart.

use crate::ingest::IngestPipeline;
use crate::metrics::IngestMetrics;
use crate::retry::{RetryPolicy, retry};
use order_ingest_core::{
    DeadLetterQueue, InboundMessage, IngestError, MessageSource, Order, SourceError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Default pause after a failed receive before polling again.
pub const DEFAULT_RECEIVE_ERROR_DELAY: Duration = Duration::from_secs(1);

/// Default pause between attempts at settling a held message.
pub const DEFAULT_HOLD_DELAY: Duration = Duration::from_secs(2);

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Persisted, cached and committed.
    Acknowledged {
        /// Identifier of the ingested order
        order_uid: String,
    },
    /// Processing failed; the message was not committed.
    Rejected {
        /// Failure label from [`IngestError::kind`]
        kind: &'static str,
        /// Dead-letter entry, when one was recorded
        dead_letter_id: Option<i64>,
    },
    /// Persisted and cached, but the commit failed; the broker will redeliver.
    AcknowledgeFailed {
        /// Identifier of the ingested order
        order_uid: String,
    },
    /// Shutdown arrived while the message was held; it was neither stored nor
    /// dead-lettered and will be redelivered.
    Unsettled {
        /// Failure label of the first attempt
        kind: &'static str,
    },
}

/// How a held message was finally settled.
enum Settled {
    Stored(Order),
    DeadLettered { kind: &'static str, id: i64 },
    Skipped { kind: &'static str },
}

/// Counters accumulated over a consumer's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Messages received from the source
    pub received: u64,
    /// Messages fully processed and committed
    pub acknowledged: u64,
    /// Messages that failed processing
    pub rejected: u64,
    /// Failed messages recorded in the dead letter queue
    pub dead_lettered: u64,
    /// Processed messages whose commit failed
    pub acknowledge_failures: u64,
    /// Failed receive calls
    pub receive_errors: u64,
    /// Failed messages that could not be dead-lettered and had to be held
    pub held: u64,
}

/// Single-task consumer feeding broker messages through the ingestion pipeline.
pub struct IngestionConsumer {
    name: String,
    source: Arc<dyn MessageSource>,
    pipeline: IngestPipeline,
    dead_letters: Option<Arc<dyn DeadLetterQueue>>,
    shutdown: broadcast::Receiver<()>,
    receive_error_delay: Duration,
    hold_delay: Duration,
    stopping: bool,
    stats: ConsumerStats,
}

impl IngestionConsumer {
    /// Create a consumer with no dead letter queue and the default receive-error delay.
    #[must_use]
    pub fn new(
        source: Arc<dyn MessageSource>,
        pipeline: IngestPipeline,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            name: "orders".to_string(),
            source,
            pipeline,
            dead_letters: None,
            shutdown,
            receive_error_delay: DEFAULT_RECEIVE_ERROR_DELAY,
            hold_delay: DEFAULT_HOLD_DELAY,
            stopping: false,
            stats: ConsumerStats::default(),
        }
    }

    /// Set the consumer name used in logs.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Record failed messages in `dead_letters`.
    #[must_use]
    pub fn with_dead_letters(mut self, dead_letters: Arc<dyn DeadLetterQueue>) -> Self {
        self.dead_letters = Some(dead_letters);
        self
    }

    /// Set how long to wait after a failed receive.
    #[must_use]
    pub const fn with_receive_error_delay(mut self, delay: Duration) -> Self {
        self.receive_error_delay = delay;
        self
    }

    /// Set how long to wait between attempts at settling a held message.
    #[must_use]
    pub const fn with_hold_delay(mut self, delay: Duration) -> Self {
        self.hold_delay = delay;
        self
    }

    /// Spawn the consumer as a background task.
    ///
    /// The task resolves to the final [`ConsumerStats`] once the shutdown signal
    /// arrives or the source closes.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<ConsumerStats> {
        tokio::spawn(async move { self.run().await })
    }

    /// Run until shutdown or until the source closes.
    pub async fn run(&mut self) -> ConsumerStats {
        info!(consumer = %self.name, "Ingestion consumer started");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Ingestion consumer received shutdown signal");
                    break;
                }
                received = self.source.next_message() => {
                    match received {
                        Ok(message) => {
                            self.stats.received += 1;
                            self.handle_message(&message).await;
                            if self.stopping {
                                break;
                            }
                        }
                        Err(SourceError::Closed) => {
                            info!(consumer = %self.name, "Message source closed");
                            break;
                        }
                        Err(e) => {
                            self.stats.receive_errors += 1;
                            error!(
                                consumer = %self.name,
                                error = %e,
                                "Failed to receive message, retrying in {:?}",
                                self.receive_error_delay
                            );
                            if self.pause_after_receive_error().await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!(consumer = %self.name, stats = ?self.stats, "Ingestion consumer stopped");
        self.stats
    }

    /// Process one message and acknowledge it on success.
    ///
    /// A failure that can be neither dead-lettered nor skipped holds the
    /// consumer on this message until it settles or shutdown arrives.
    pub async fn handle_message(&mut self, message: &InboundMessage) -> MessageOutcome {
        let e = match self.pipeline.ingest(&message.payload).await {
            Ok(order) => return self.acknowledge(message, order).await,
            Err(e) => e,
        };

        self.stats.rejected += 1;
        IngestMetrics::record_rejected(e.kind());
        warn!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            kind = e.kind(),
            error = %e,
            "Message processing failed, not acknowledging"
        );

        if let Some(id) = self.dead_letter(message, &e).await {
            return MessageOutcome::Rejected {
                kind: e.kind(),
                dead_letter_id: Some(id),
            };
        }
        if self.dead_letters.is_none() && e.is_permanent() {
            return MessageOutcome::Rejected {
                kind: e.kind(),
                dead_letter_id: None,
            };
        }
        self.hold(message, e.kind()).await
    }

    /// Current counters.
    #[must_use]
    pub const fn stats(&self) -> ConsumerStats {
        self.stats
    }

    async fn acknowledge(&mut self, message: &InboundMessage, order: Order) -> MessageOutcome {
        match self.source.acknowledge(message).await {
            Ok(()) => {
                self.stats.acknowledged += 1;
                info!(
                    order_uid = %order.order_uid,
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "Order ingested"
                );
                MessageOutcome::Acknowledged {
                    order_uid: order.order_uid,
                }
            }
            Err(e) => {
                self.stats.acknowledge_failures += 1;
                error!(
                    order_uid = %order.order_uid,
                    offset = message.offset,
                    error = %e,
                    "Order stored but commit failed; it will be redelivered"
                );
                MessageOutcome::AcknowledgeFailed {
                    order_uid: order.order_uid,
                }
            }
        }
    }

    async fn dead_letter(&mut self, message: &InboundMessage, err: &IngestError) -> Option<i64> {
        let id = record_dead_letter(self.dead_letters.as_deref()?, message, err).await?;
        self.stats.dead_lettered += 1;
        IngestMetrics::record_dead_lettered();
        Some(id)
    }

    /// Retry `message` until it is stored, dead-lettered or skipped.
    ///
    /// No further message is received meanwhile, so no later commit can pass its
    /// offset. Shutdown abandons it uncommitted.
    async fn hold(&mut self, message: &InboundMessage, kind: &'static str) -> MessageOutcome {
        self.stats.held += 1;
        error!(
            consumer = %self.name,
            partition = message.partition,
            offset = message.offset,
            kind,
            "Message could not be stored or dead-lettered, holding until it can"
        );

        let policy = RetryPolicy::unbounded(self.hold_delay);
        let pipeline = &self.pipeline;
        let dead_letters = self.dead_letters.as_deref();
        let settling = retry(&policy, "settle held message", |_| {
            settle(pipeline, dead_letters, message)
        });

        let settled = tokio::select! {
            _ = self.shutdown.recv() => None,
            settled = settling => settled.ok(),
        };

        match settled {
            Some(Settled::Stored(order)) => self.acknowledge(message, order).await,
            Some(Settled::DeadLettered { kind, id }) => {
                self.stats.dead_lettered += 1;
                IngestMetrics::record_dead_lettered();
                MessageOutcome::Rejected {
                    kind,
                    dead_letter_id: Some(id),
                }
            }
            Some(Settled::Skipped { kind }) => MessageOutcome::Rejected {
                kind,
                dead_letter_id: None,
            },
            None => {
                self.stopping = true;
                info!(
                    consumer = %self.name,
                    offset = message.offset,
                    "Shutdown while holding a message, leaving it uncommitted"
                );
                MessageOutcome::Unsettled { kind }
            }
        }
    }

    /// Sleep for the receive-error delay; returns `true` if shutdown arrived meanwhile.
    async fn pause_after_receive_error(&mut self) -> bool {
        tokio::select! {
            _ = self.shutdown.recv() => {
                info!(consumer = %self.name, "Ingestion consumer received shutdown signal");
                true
            }
            () = tokio::time::sleep(self.receive_error_delay) => false,
        }
    }
}

/// One attempt at settling a held message.
async fn settle(
    pipeline: &IngestPipeline,
    dead_letters: Option<&dyn DeadLetterQueue>,
    message: &InboundMessage,
) -> Result<Settled, IngestError> {
    let err = match pipeline.ingest(&message.payload).await {
        Ok(order) => return Ok(Settled::Stored(order)),
        Err(e) => e,
    };
    match dead_letters {
        Some(dead_letters) => match record_dead_letter(dead_letters, message, &err).await {
            Some(id) => Ok(Settled::DeadLettered {
                kind: err.kind(),
                id,
            }),
            None => Err(err),
        },
        None if err.is_permanent() => Ok(Settled::Skipped { kind: err.kind() }),
        None => Err(err),
    }
}

async fn record_dead_letter(
    dead_letters: &dyn DeadLetterQueue,
    message: &InboundMessage,
    err: &IngestError,
) -> Option<i64> {
    match dead_letters.record(message, err).await {
        Ok(id) => Some(id),
        Err(record_err) => {
            error!(
                offset = message.offset,
                error = %record_err,
                "Failed to record dead letter"
            );
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cache::OrderCache;
    use order_ingest_core::OrderStore;
    use order_ingest_testing::{
        InMemoryDeadLetterQueue, InMemoryMessageSource, InMemoryOrderStore, fixtures,
    };
    use std::num::NonZeroUsize;

    struct Harness {
        store: InMemoryOrderStore,
        source: InMemoryMessageSource,
        dead_letters: InMemoryDeadLetterQueue,
        cache: Arc<OrderCache>,
        shutdown: broadcast::Sender<()>,
    }

    impl Harness {
        fn new(source: InMemoryMessageSource) -> Self {
            let (shutdown, _) = broadcast::channel(1);
            Self {
                store: InMemoryOrderStore::new(),
                source,
                dead_letters: InMemoryDeadLetterQueue::new(),
                cache: Arc::new(OrderCache::new(NonZeroUsize::new(10).unwrap())),
                shutdown,
            }
        }

        fn consumer(&self) -> IngestionConsumer {
            let pipeline = IngestPipeline::new(Arc::new(self.store.clone()), Arc::clone(&self.cache));
            IngestionConsumer::new(
                Arc::new(self.source.clone()),
                pipeline,
                self.shutdown.subscribe(),
            )
            .with_dead_letters(Arc::new(self.dead_letters.clone()))
        }
    }

    #[tokio::test]
    async fn acknowledges_only_successful_messages() {
        let harness = Harness::new(InMemoryMessageSource::with_messages([
            fixtures::message(&fixtures::order("A1"), 0),
            fixtures::raw_message(b"garbage", 1),
            fixtures::message(&fixtures::order("A2"), 2),
        ]));

        let stats = harness.consumer().run().await;

        assert_eq!(harness.source.acknowledged_offsets(), vec![0, 2]);
        assert_eq!(stats.received, 3);
        assert_eq!(stats.acknowledged, 2);
        assert_eq!(stats.rejected, 1);
        assert!(harness.cache.contains("A1"));
        assert!(harness.cache.contains("A2"));
    }

    #[tokio::test]
    async fn failed_message_is_dead_lettered_with_payload() {
        let harness = Harness::new(InMemoryMessageSource::with_messages([fixtures::raw_message(
            b"{\"order_uid\": 5}",
            7,
        )]));

        let stats = harness.consumer().run().await;

        assert_eq!(stats.dead_lettered, 1);
        let entries = harness.dead_letters.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message.offset, 7);
        assert_eq!(entries[0].error_kind, "format");
        assert!(harness.source.acknowledged().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_not_acknowledged_and_replay_succeeds() {
        let harness = Harness::new(InMemoryMessageSource::new());
        let mut consumer = harness.consumer();
        let message = fixtures::message(&fixtures::order("A1"), 3);

        harness.store.fail_next_upserts(1);
        let outcome = consumer.handle_message(&message).await;
        assert!(matches!(
            outcome,
            MessageOutcome::Rejected { kind: "store", dead_letter_id: Some(_) }
        ));
        assert!(harness.source.acknowledged().is_empty());
        assert!(!harness.cache.contains("A1"));

        let outcome = consumer.handle_message(&message).await;
        assert_eq!(
            outcome,
            MessageOutcome::Acknowledged { order_uid: "A1".to_string() }
        );
        assert_eq!(harness.source.acknowledged_offsets(), vec![3]);
        assert_eq!(harness.store.get_order("A1").await.unwrap().order_uid, "A1");
    }

    #[tokio::test]
    async fn commit_failure_keeps_order_stored() {
        let harness = Harness::new(InMemoryMessageSource::new());
        harness.source.set_fail_acks(true);
        let mut consumer = harness.consumer();

        let outcome = consumer
            .handle_message(&fixtures::message(&fixtures::order("A1"), 0))
            .await;

        assert!(matches!(outcome, MessageOutcome::AcknowledgeFailed { .. }));
        assert_eq!(consumer.stats().acknowledge_failures, 1);
        assert!(harness.cache.contains("A1"));
    }

    #[tokio::test]
    async fn works_without_dead_letter_queue() {
        let harness = Harness::new(InMemoryMessageSource::new());
        let pipeline =
            IngestPipeline::new(Arc::new(harness.store.clone()), Arc::clone(&harness.cache));
        let mut consumer = IngestionConsumer::new(
            Arc::new(harness.source.clone()),
            pipeline,
            harness.shutdown.subscribe(),
        );

        let outcome = consumer
            .handle_message(&fixtures::raw_message(b"[]", 0))
            .await;

        assert_eq!(
            outcome,
            MessageOutcome::Rejected { kind: "format", dead_letter_id: None }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unrecordable_failure_holds_later_commits() {
        let harness = Harness::new(InMemoryMessageSource::with_messages([
            fixtures::message(&fixtures::order("A0"), 0),
            fixtures::message(&fixtures::order("A1"), 1),
        ]));
        harness.store.set_unavailable(true);
        harness.dead_letters.set_unavailable(true);
        let handle = harness.consumer().spawn();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(harness.source.acknowledged().is_empty());

        harness.store.set_unavailable(false);
        harness.dead_letters.set_unavailable(false);
        let stats = handle.await.unwrap();

        assert_eq!(harness.source.acknowledged_offsets(), vec![0, 1]);
        assert_eq!(harness.store.get_order("A0").await.unwrap().order_uid, "A0");
        assert_eq!(stats.held, 1);
        assert_eq!(stats.acknowledged, 2);
        assert_eq!(stats.dead_lettered, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn held_message_is_dead_lettered_once_queue_recovers() {
        let harness = Harness::new(InMemoryMessageSource::new());
        harness.dead_letters.set_unavailable(true);
        let mut consumer = harness.consumer();
        let message = fixtures::raw_message(b"garbage", 4);

        let recover = {
            let dead_letters = harness.dead_letters.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                dead_letters.set_unavailable(false);
            })
        };
        let outcome = consumer.handle_message(&message).await;
        recover.await.unwrap();

        assert!(matches!(
            outcome,
            MessageOutcome::Rejected { kind: "format", dead_letter_id: Some(_) }
        ));
        assert_eq!(harness.dead_letters.entries()[0].message.offset, 4);
        assert_eq!(consumer.stats().held, 1);
        assert_eq!(consumer.stats().dead_lettered, 1);
        assert!(harness.source.acknowledged().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_abandons_held_message() {
        let harness = Harness::new(InMemoryMessageSource::with_messages([
            fixtures::message(&fixtures::order("A0"), 0),
            fixtures::message(&fixtures::order("A1"), 1),
        ]));
        harness.store.set_unavailable(true);
        harness.dead_letters.set_unavailable(true);
        let handle = harness.consumer().spawn();

        tokio::time::sleep(Duration::from_secs(3)).await;
        harness.shutdown.send(()).unwrap();
        let stats = handle.await.unwrap();

        assert_eq!(stats.received, 1);
        assert_eq!(stats.held, 1);
        assert!(harness.source.acknowledged().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_without_queue_is_held_until_stored() {
        let harness = Harness::new(InMemoryMessageSource::new());
        let pipeline =
            IngestPipeline::new(Arc::new(harness.store.clone()), Arc::clone(&harness.cache));
        let mut consumer = IngestionConsumer::new(
            Arc::new(harness.source.clone()),
            pipeline,
            harness.shutdown.subscribe(),
        );
        harness.store.fail_next_upserts(2);

        let outcome = consumer
            .handle_message(&fixtures::message(&fixtures::order("A0"), 0))
            .await;

        assert_eq!(
            outcome,
            MessageOutcome::Acknowledged { order_uid: "A0".to_string() }
        );
        assert_eq!(consumer.stats().held, 1);
        assert_eq!(harness.source.acknowledged_offsets(), vec![0]);
    }

    #[tokio::test]
    async fn shutdown_interrupts_blocking_receive() {
        let harness = Harness::new(InMemoryMessageSource::new());
        let handle = harness.consumer().spawn();

        harness.source.push(fixtures::message(&fixtures::order("A1"), 0));
        tokio::time::timeout(Duration::from_secs(5), async {
            while harness.source.acknowledged().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        harness.shutdown.send(()).unwrap();
        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.acknowledged, 1);
    }
}
