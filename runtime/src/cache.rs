//! Bounded least-recently-used order cache.
//!
//! [`OrderCache`] is shared between the ingestion consumer (writes) and the read
//! path (reads and fills). It is backed by a `moka` cache with the LRU eviction
//! policy. Pending maintenance is run after every write, so the entry count never
//! stays above capacity and the entry evicted on overflow is always the one read
//! or written longest ago.

use crate::metrics::CacheMetrics;
use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use order_ingest_core::Order;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default number of orders kept in memory.
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

/// Thread-safe LRU cache of complete orders keyed by `order_uid`.
///
/// Construct once and share via `Arc`. Values are cloned in and out.
pub struct OrderCache {
    inner: Cache<String, Order>,
    capacity: NonZeroUsize,
}

impl OrderCache {
    /// Create an empty cache holding at most `capacity` orders.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        let inner = Cache::builder()
            .max_capacity(u64::try_from(capacity.get()).unwrap_or(u64::MAX))
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(|order_uid: Arc<String>, _order: Order, cause: RemovalCause| {
                if cause == RemovalCause::Size {
                    tracing::debug!(order_uid = %order_uid, "Evicted order from cache");
                    CacheMetrics::record_eviction();
                }
            })
            .build();

        Self { inner, capacity }
    }

    /// Cached order for `order_uid`, refreshing its recency.
    #[must_use]
    pub fn get(&self, order_uid: &str) -> Option<Order> {
        let hit = self.inner.get(order_uid);
        if hit.is_some() {
            CacheMetrics::record_hit();
        } else {
            CacheMetrics::record_miss();
        }
        hit
    }

    /// Insert or replace an order, evicting the least recently used one if full.
    pub fn set(&self, order: Order) {
        self.inner.insert(order.order_uid.clone(), order);
        CacheMetrics::record_size(self.len());
    }

    /// Drop `order_uid` from the cache if present.
    pub fn invalidate(&self, order_uid: &str) {
        self.inner.invalidate(order_uid);
        CacheMetrics::record_size(self.len());
    }

    /// Number of cached orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.run_pending_tasks();
        usize::try_from(self.inner.entry_count()).unwrap_or(usize::MAX)
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Whether `order_uid` is cached. Does not affect eviction order.
    #[must_use]
    pub fn contains(&self, order_uid: &str) -> bool {
        self.inner.contains_key(order_uid)
    }
}

impl Default for OrderCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for OrderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderCache")
            .field("capacity", &self.capacity)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use order_ingest_testing::fixtures;
    use proptest::prelude::*;

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn key(n: usize) -> String {
        format!("K{n}")
    }

    #[test]
    fn order_cache_round_trip() {
        let cache = OrderCache::new(cap(2));
        assert!(cache.is_empty());
        assert!(cache.get("A1").is_none());

        cache.set(fixtures::order("A1"));
        assert_eq!(cache.get("A1").unwrap().order_uid, "A1");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.capacity(), 2);
    }

    #[test]
    fn get_refreshes_recency() {
        let cache = OrderCache::new(cap(2));
        cache.set(fixtures::order("A1"));
        cache.set(fixtures::order("A2"));
        let _ = cache.get("A1");
        cache.set(fixtures::order("A3"));

        assert!(cache.contains("A1"));
        assert!(!cache.contains("A2"));
        assert!(cache.contains("A3"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn contains_does_not_touch_recency() {
        let cache = OrderCache::new(cap(2));
        cache.set(fixtures::order("A1"));
        cache.set(fixtures::order("A2"));

        assert!(cache.contains("A1"));
        cache.set(fixtures::order("A3"));

        assert!(!cache.contains("A1"));
        assert!(cache.contains("A2"));
    }

    #[test]
    fn replacing_existing_key_does_not_evict() {
        let cache = OrderCache::new(cap(2));
        cache.set(fixtures::order("A1"));
        cache.set(fixtures::order("A2"));

        let mut newer = fixtures::order("A1");
        newer.payment.amount = 4242;
        cache.set(newer);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("A1").unwrap().payment.amount, 4242);
        assert!(cache.contains("A2"));
    }

    #[test]
    fn capacity_one_keeps_latest() {
        let cache = OrderCache::new(cap(1));
        cache.set(fixtures::order("A1"));
        cache.set(fixtures::order("A2"));

        assert_eq!(cache.len(), 1);
        assert!(cache.contains("A2"));
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = OrderCache::new(cap(2));
        cache.set(fixtures::order("A1"));

        cache.invalidate("A1");
        cache.invalidate("never-cached");

        assert!(cache.get("A1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn default_capacity_is_one_hundred() {
        assert_eq!(OrderCache::default().capacity(), 100);
    }

    #[test]
    fn concurrent_readers_and_writer_stay_bounded() {
        const CAPACITY: usize = 8;
        const KEYS: usize = 32;
        const ROUNDS: i64 = 50;

        let cache = OrderCache::new(cap(CAPACITY));

        std::thread::scope(|scope| {
            for reader in 0..4 {
                let cache = &cache;
                scope.spawn(move || {
                    for i in 0..2_000 {
                        let uid = key((i + reader) % KEYS);
                        if let Some(order) = cache.get(&uid) {
                            assert_eq!(order.order_uid, uid);
                        }
                        assert!(cache.len() <= CAPACITY);
                    }
                });
            }

            let cache = &cache;
            scope.spawn(move || {
                for round in 1..=ROUNDS {
                    for n in 0..KEYS {
                        let mut order = fixtures::order(&key(n));
                        order.payment.amount = round;
                        cache.set(order);
                    }
                }
            });
        });

        assert!(cache.len() <= CAPACITY);
        let last = cache.get(&key(KEYS - 1)).unwrap();
        assert_eq!(last.payment.amount, ROUNDS);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn never_exceeds_capacity(capacity in 1usize..16, keys in prop::collection::vec(0usize..32, 0..200)) {
            let cache = OrderCache::new(cap(capacity));
            for n in keys {
                cache.set(fixtures::order(&key(n)));
                prop_assert!(cache.len() <= capacity);
            }
        }

        #[test]
        fn overflow_evicts_exactly_the_least_recent(capacity in 1usize..16, touches in prop::collection::vec(0usize..16, 0..64)) {
            let cache = OrderCache::new(cap(capacity));
            // Most recent last.
            let mut recency: Vec<usize> = Vec::with_capacity(capacity);
            for n in 0..capacity {
                cache.set(fixtures::order(&key(n)));
                recency.push(n);
            }
            for touch in touches {
                let n = touch % capacity;
                prop_assert!(cache.get(&key(n)).is_some());
                recency.retain(|&k| k != n);
                recency.push(n);
            }
            let least_recent = recency[0];

            cache.set(fixtures::order(&key(capacity)));

            prop_assert!(!cache.contains(&key(least_recent)));
            prop_assert!(cache.contains(&key(capacity)));
            prop_assert_eq!(cache.len(), capacity);
        }
    }
}
