//! Decode, validate, persist and cache one order payload.
//!
//! [`IngestPipeline`] is the part of message handling that does not depend on
//! where the payload came from. The consumer loop runs broker messages through it,
//! and dead-letter replay runs stored payloads through the very same steps.

use crate::cache::OrderCache;
use crate::metrics::IngestMetrics;
use crate::retry::{RetryPolicy, retry};
use order_ingest_core::{IngestError, Order, OrderStore, StoreError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default deadline for writing one order, and separately for each read-back.
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Default attempts at reading an order back once its write has committed.
pub const DEFAULT_READ_BACK_POLICY: RetryPolicy = RetryPolicy::bounded(3, Duration::from_millis(200));

/// Shared ingestion steps: decode → validate → upsert → re-read → cache.
#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    process_timeout: Duration,
    read_back_policy: RetryPolicy,
}

impl IngestPipeline {
    /// Create a pipeline writing to `store` and refreshing `cache`.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, cache: Arc<OrderCache>) -> Self {
        Self {
            store,
            cache,
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
            read_back_policy: DEFAULT_READ_BACK_POLICY,
        }
    }

    /// Bound the upsert, and each read-back attempt, by `timeout`.
    #[must_use]
    pub const fn with_process_timeout(mut self, timeout: Duration) -> Self {
        self.process_timeout = timeout;
        self
    }

    /// Retry the read-back of a written order under `policy`.
    #[must_use]
    pub const fn with_read_back_policy(mut self, policy: RetryPolicy) -> Self {
        self.read_back_policy = policy;
        self
    }

    /// Configured persistence deadline.
    #[must_use]
    pub const fn process_timeout(&self) -> Duration {
        self.process_timeout
    }

    /// Deserialize and structurally validate a payload.
    ///
    /// # Errors
    ///
    /// [`IngestError::Format`] for malformed JSON, [`IngestError::Validation`] for an
    /// order missing required fields.
    pub fn decode(payload: &[u8]) -> Result<Order, IngestError> {
        let order = Order::from_json(payload)?;
        order.validate()?;
        Ok(order)
    }

    /// Run a payload through every step and return the order as stored.
    ///
    /// The cache only ever receives what the store returned after the write. If
    /// the write or the read-back fails, any cached version of the order is dropped,
    /// so readers go back to the store instead of seeing an older version.
    ///
    /// # Errors
    ///
    /// Decoding errors as in [`decode`](Self::decode); [`IngestError::Store`] when the
    /// upsert fails or exceeds the deadline, or every read-back attempt fails.
    pub async fn ingest(&self, payload: &[u8]) -> Result<Order, IngestError> {
        let started = Instant::now();
        let order = Self::decode(payload)?;

        let stored = match self.persist(&order).await {
            Ok(stored) => stored,
            Err(e) => {
                self.cache.invalidate(&order.order_uid);
                return Err(e.into());
            }
        };

        self.cache.set(stored.clone());
        IngestMetrics::record_ingested(started.elapsed());
        tracing::debug!(order_uid = %stored.order_uid, "Order persisted and cached");
        Ok(stored)
    }

    async fn persist(&self, order: &Order) -> Result<Order, StoreError> {
        tokio::time::timeout(self.process_timeout, self.store.upsert_order(order))
            .await
            .map_err(|_| StoreError::Timeout(self.process_timeout))??;

        // Re-read so the cache holds what the store holds (first date_created wins).
        self.read_back(&order.order_uid).await.inspect_err(|e| {
            tracing::warn!(
                order_uid = %order.order_uid,
                error = %e,
                "Order written but could not be read back"
            );
        })
    }

    async fn read_back(&self, order_uid: &str) -> Result<Order, StoreError> {
        retry(&self.read_back_policy, "order read-back", |_| async move {
            tokio::time::timeout(self.process_timeout, self.store.get_order(order_uid))
                .await
                .map_err(|_| StoreError::Timeout(self.process_timeout))?
        })
        .await
        .map_err(|exhausted| exhausted.last_error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use order_ingest_testing::{InMemoryOrderStore, fixtures};
    use std::num::NonZeroUsize;

    fn pipeline(store: &InMemoryOrderStore) -> (IngestPipeline, Arc<OrderCache>) {
        let cache = Arc::new(OrderCache::new(NonZeroUsize::new(10).unwrap()));
        let pipeline = IngestPipeline::new(Arc::new(store.clone()), Arc::clone(&cache));
        (pipeline, cache)
    }

    #[tokio::test]
    async fn ingest_persists_and_caches() {
        let store = InMemoryOrderStore::new();
        let (pipeline, cache) = pipeline(&store);
        let order = fixtures::order("A1");

        let stored = pipeline.ingest(&fixtures::payload(&order)).await.unwrap();

        assert_eq!(stored, order);
        assert_eq!(store.order_count(), 1);
        assert_eq!(cache.get("A1").unwrap(), order);
    }

    #[tokio::test]
    async fn reingest_caches_stored_version() {
        let store = InMemoryOrderStore::new();
        let (pipeline, cache) = pipeline(&store);
        let first = fixtures::order("A1");
        pipeline.ingest(&fixtures::payload(&first)).await.unwrap();

        let mut second = fixtures::order_created_at("A1", 30);
        second.payment.amount = 4242;
        pipeline.ingest(&fixtures::payload(&second)).await.unwrap();

        let cached = cache.get("A1").unwrap();
        assert_eq!(cached.payment.amount, 4242);
        assert_eq!(cached.date_created, first.date_created);
    }

    #[tokio::test]
    async fn malformed_payload_is_format_error() {
        let store = InMemoryOrderStore::new();
        let (pipeline, cache) = pipeline(&store);

        let err = pipeline.ingest(b"{not json").await.unwrap_err();

        assert_eq!(err.kind(), "format");
        assert_eq!(store.upsert_calls(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn invalid_order_is_validation_error() {
        let store = InMemoryOrderStore::new();
        let (pipeline, _) = pipeline(&store);
        let mut order = fixtures::order("A1");
        order.delivery.phone = String::new();

        let err = pipeline.ingest(&fixtures::payload(&order)).await.unwrap_err();

        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("delivery.phone"));
        assert_eq!(store.upsert_calls(), 0);
    }

    #[tokio::test]
    async fn store_failure_leaves_cache_untouched() {
        let store = InMemoryOrderStore::new();
        let (pipeline, cache) = pipeline(&store);
        store.fail_next_upserts(1);

        let err = pipeline
            .ingest(&fixtures::payload(&fixtures::order("A1")))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "store");
        assert!(!cache.contains("A1"));
    }

    #[tokio::test(start_paused = true)]
    async fn read_back_failure_is_retried() {
        let store = InMemoryOrderStore::new();
        let (pipeline, cache) = pipeline(&store);
        pipeline.ingest(&fixtures::payload(&fixtures::order("A1"))).await.unwrap();

        let mut second = fixtures::order("A1");
        second.payment.amount = 4242;
        store.fail_next_gets(1);
        let stored = pipeline.ingest(&fixtures::payload(&second)).await.unwrap();

        assert_eq!(stored.payment.amount, 4242);
        assert_eq!(cache.get("A1").unwrap().payment.amount, 4242);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_read_back_drops_cached_version() {
        let store = InMemoryOrderStore::new();
        let (pipeline, cache) = pipeline(&store);
        pipeline.ingest(&fixtures::payload(&fixtures::order("A1"))).await.unwrap();
        assert!(cache.contains("A1"));

        let mut second = fixtures::order("A1");
        second.payment.amount = 4242;
        store.fail_next_gets(10);
        let err = pipeline.ingest(&fixtures::payload(&second)).await.unwrap_err();

        assert_eq!(err.kind(), "store");
        assert!(!cache.contains("A1"));

        store.fail_next_gets(0);
        assert_eq!(store.get_order("A1").await.unwrap().payment.amount, 4242);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out() {
        let store = InMemoryOrderStore::new();
        store.set_latency(Duration::from_secs(60));
        let (pipeline, cache) = pipeline(&store);
        let pipeline = pipeline.with_process_timeout(Duration::from_secs(5));

        let err = pipeline
            .ingest(&fixtures::payload(&fixtures::order("A1")))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Store(StoreError::Timeout(_))));
        assert_eq!(err.kind(), "timeout");
        assert!(cache.is_empty());
    }
}
