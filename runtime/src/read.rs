//! Cache-then-store read path and startup cache warm.

use crate::cache::OrderCache;
use order_ingest_core::{Order, OrderStore, StoreError};
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves orders for API callers, filling the cache on store hits.
#[derive(Clone)]
pub struct OrderReader {
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
}

impl OrderReader {
    /// Create a reader over `store` and `cache`.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, cache: Arc<OrderCache>) -> Self {
        Self { store, cache }
    }

    /// The cache this reader fills.
    #[must_use]
    pub const fn cache(&self) -> &Arc<OrderCache> {
        &self.cache
    }

    /// Look up an order, preferring the cache.
    ///
    /// A cache hit never touches the store. On a miss the store result is cached;
    /// a not-found result leaves the cache unchanged.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no complete order exists, any other
    /// [`StoreError`] when the store could not answer.
    pub async fn get_order_for_read(&self, order_uid: &str) -> Result<Order, StoreError> {
        if let Some(order) = self.cache.get(order_uid) {
            debug!(order_uid, "Cache hit");
            return Ok(order);
        }

        let order = self.store.get_order(order_uid).await?;
        self.cache.set(order.clone());
        debug!(order_uid, "Cache miss, loaded from store");
        Ok(order)
    }

    /// Load up to `limit` most recent orders into the cache.
    ///
    /// Returns how many orders were cached.
    ///
    /// # Errors
    ///
    /// Returns the store error if the recent orders could not be listed.
    pub async fn warm_cache(&self, limit: usize) -> Result<usize, StoreError> {
        let orders = self.store.list_recent_orders(limit).await?;
        let count = orders.len();
        // Oldest first so the newest end up most recently used.
        for order in orders.into_iter().rev() {
            self.cache.set(order);
        }
        info!(count, limit, "Cache warmed from store");
        Ok(count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use order_ingest_testing::{InMemoryOrderStore, fixtures};
    use std::num::NonZeroUsize;

    fn reader(store: &InMemoryOrderStore, capacity: usize) -> OrderReader {
        OrderReader::new(
            Arc::new(store.clone()),
            Arc::new(OrderCache::new(NonZeroUsize::new(capacity).unwrap())),
        )
    }

    #[tokio::test]
    async fn cache_hit_skips_store() {
        let store = InMemoryOrderStore::new();
        let reader = reader(&store, 10);
        reader.cache().set(fixtures::order("A1"));

        let order = reader.get_order_for_read("A1").await.unwrap();

        assert_eq!(order.order_uid, "A1");
        assert_eq!(store.get_calls(), 0);
    }

    #[tokio::test]
    async fn miss_loads_and_caches() {
        let store = InMemoryOrderStore::new();
        store.upsert_order(&fixtures::order("A1")).await.unwrap();
        let reader = reader(&store, 10);

        reader.get_order_for_read("A1").await.unwrap();
        reader.get_order_for_read("A1").await.unwrap();

        assert_eq!(store.get_calls(), 1);
        assert!(reader.cache().contains("A1"));
    }

    #[tokio::test]
    async fn not_found_leaves_cache_unchanged() {
        let store = InMemoryOrderStore::new();
        let reader = reader(&store, 10);

        let err = reader.get_order_for_read("does-not-exist").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(reader.cache().is_empty());
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let store = InMemoryOrderStore::new();
        store.set_unavailable(true);
        let reader = reader(&store, 10);

        let err = reader.get_order_for_read("A1").await.unwrap_err();

        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn warm_keeps_newest_orders() {
        let store = InMemoryOrderStore::new();
        for (uid, minutes) in [("a", 0), ("b", 10), ("c", 20), ("d", 30)] {
            store
                .upsert_order(&fixtures::order_created_at(uid, minutes))
                .await
                .unwrap();
        }
        let reader = reader(&store, 2);

        let count = reader.warm_cache(3).await.unwrap();

        assert_eq!(count, 3);
        assert_eq!(reader.cache().len(), 2);
        assert!(reader.cache().contains("d"));
        assert!(reader.cache().contains("c"));
        assert!(!reader.cache().contains("b"));
    }
}
