//! Background consumer task and graceful shutdown.
//!
//! # Graceful Shutdown
//!
//! When Ctrl+C or SIGTERM arrives:
//! 1. The HTTP server stops accepting connections and drains requests
//! 2. The shutdown signal is broadcast to the consumer task
//! 3. The consumer finishes the message in hand and stops (10s timeout)
//! 4. The database pool is closed

use crate::bootstrap::wait_for_broker;
use crate::config::KafkaConfig;
use order_ingest_core::{ConnectionError, DeadLetterQueue, MessageSource, SourceError};
use order_ingest_redpanda::KafkaOrderSource;
use order_ingest_runtime::{ConsumerStats, IngestPipeline, IngestionConsumer};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How long the consumer task gets to stop after the shutdown broadcast.
pub const CONSUMER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait for the broker, subscribe and consume until shutdown.
///
/// Returns `None` if shutdown arrived before consuming started or the source
/// could not be created.
pub async fn run_consumer(
    kafka: KafkaConfig,
    pipeline: IngestPipeline,
    dead_letters: Arc<dyn DeadLetterQueue>,
    shutdown: broadcast::Receiver<()>,
) -> Option<ConsumerStats> {
    let name = kafka.topic.clone();
    consume_when_ready(
        wait_for_broker(&kafka),
        || {
            let source = KafkaOrderSource::builder()
                .brokers(&kafka.brokers)
                .topic(&kafka.topic)
                .group(kafka.group_identity())
                .auto_offset_reset(&kafka.auto_offset_reset)
                .build()?;
            info!(consumer_group = source.group_id(), "Kafka source ready");
            Ok(Arc::new(source) as Arc<dyn MessageSource>)
        },
        PendingConsumer::new(name, pipeline, dead_letters),
        shutdown,
    )
    .await
}

/// Parts of an [`IngestionConsumer`] that exist before its source does.
pub struct PendingConsumer {
    name: String,
    pipeline: IngestPipeline,
    dead_letters: Arc<dyn DeadLetterQueue>,
}

impl PendingConsumer {
    /// Stage a consumer named `name`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        pipeline: IngestPipeline,
        dead_letters: Arc<dyn DeadLetterQueue>,
    ) -> Self {
        Self {
            name: name.into(),
            pipeline,
            dead_letters,
        }
    }
}

/// Await `ready`, build the source with `connect`, then run the consumer.
///
/// Shutdown is honoured while waiting; once consuming, the consumer loop
/// handles it itself.
pub async fn consume_when_ready<R, C>(
    ready: R,
    connect: C,
    pending: PendingConsumer,
    mut shutdown: broadcast::Receiver<()>,
) -> Option<ConsumerStats>
where
    R: Future<Output = Result<(), ConnectionError>>,
    C: FnOnce() -> Result<Arc<dyn MessageSource>, SourceError>,
{
    tokio::select! {
        _ = shutdown.recv() => {
            info!("Shutdown before the broker became reachable");
            return None;
        }
        result = ready => {
            if let Err(e) = result {
                error!(error = %e, "Broker never became reachable");
                return None;
            }
        }
    }

    let source = match connect() {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "Failed to create message source");
            return None;
        }
    };

    let mut consumer = IngestionConsumer::new(source, pending.pipeline, shutdown)
        .with_name(pending.name)
        .with_dead_letters(pending.dead_letters);
    Some(consumer.run().await)
}

/// Wait for the consumer task to stop, up to [`CONSUMER_SHUTDOWN_TIMEOUT`].
pub async fn await_consumer(handle: JoinHandle<Option<ConsumerStats>>) {
    match tokio::time::timeout(CONSUMER_SHUTDOWN_TIMEOUT, handle).await {
        Ok(Ok(Some(stats))) => info!(
            received = stats.received,
            acknowledged = stats.acknowledged,
            rejected = stats.rejected,
            dead_lettered = stats.dead_lettered,
            held = stats.held,
            "Consumer stopped gracefully"
        ),
        Ok(Ok(None)) => info!("Consumer stopped before consuming"),
        Ok(Err(e)) => warn!(error = %e, "Consumer task failed"),
        Err(_) => warn!("Consumer shutdown timed out"),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
