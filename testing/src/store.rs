//! In-memory order store.

use order_ingest_core::{Delivery, Item, Order, OrderStore, Payment, StoreError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

#[derive(Default)]
struct Tables {
    // Root rows are kept as whole orders; their delivery, payment and items fields
    // are ignored and re-read from the side tables, mirroring the four relations.
    orders: HashMap<String, Order>,
    deliveries: HashMap<String, Delivery>,
    payments: HashMap<String, Payment>,
    items: HashMap<String, Vec<Item>>,
}

impl Tables {
    fn hydrate(&self, order_uid: &str) -> Option<Order> {
        let root = self.orders.get(order_uid)?;
        let delivery = self.deliveries.get(order_uid)?;
        let payment = self.payments.get(order_uid)?;
        let mut order = root.clone();
        order.delivery = delivery.clone();
        order.payment = payment.clone();
        order.items = self.items.get(order_uid).cloned().unwrap_or_default();
        Some(order)
    }
}

/// In-memory order store for fast, deterministic testing.
///
/// Applies the same idempotency rules as the Postgres store: the root row is
/// insert-or-ignore, delivery and payment are replaced, items are upserted by `rid`.
/// Writes are applied all-or-nothing under a single lock.
///
/// Failure injection:
/// - [`fail_next_upserts`](Self::fail_next_upserts): the next `n` upserts fail
/// - [`fail_next_gets`](Self::fail_next_gets): the next `n` `get_order` calls fail
/// - [`set_unavailable`](Self::set_unavailable): every operation fails
/// - [`set_latency`](Self::set_latency): every operation sleeps first
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    tables: Arc<RwLock<Tables>>,
    failing_upserts: Arc<AtomicUsize>,
    failing_gets: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
    latency: Arc<Mutex<Option<Duration>>>,
    upsert_calls: Arc<AtomicUsize>,
    get_calls: Arc<AtomicUsize>,
}

impl InMemoryOrderStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `upsert_order` fail with a database error.
    pub fn fail_next_upserts(&self, n: usize) {
        self.failing_upserts.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` calls to `get_order` fail with a database error.
    pub fn fail_next_gets(&self, n: usize) {
        self.failing_gets.store(n, Ordering::SeqCst);
    }

    /// Make every operation fail (or succeed again) with a database error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Insert only the root row of an order, without delivery or payment.
    ///
    /// Useful for exercising the completeness gate.
    pub fn insert_root_only(&self, order: &Order) {
        self.tables
            .write()
            .unwrap()
            .orders
            .insert(order.order_uid.clone(), order.clone());
    }

    /// Number of `upsert_order` calls so far.
    #[must_use]
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_order` calls so far.
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of root rows.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.tables.read().unwrap().orders.len()
    }

    /// Number of item rows stored for an order.
    #[must_use]
    pub fn item_count(&self, order_uid: &str) -> usize {
        self.tables
            .read()
            .unwrap()
            .items
            .get(order_uid)
            .map_or(0, Vec::len)
    }

    async fn simulate(&self) -> Result<(), StoreError> {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".to_string()));
        }
        Ok(())
    }

    fn take_injected_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn upsert_order<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.upsert_calls.fetch_add(1, Ordering::SeqCst);
            self.simulate().await?;
            if Self::take_injected_failure(&self.failing_upserts) {
                return Err(StoreError::Database("injected upsert failure".to_string()));
            }

            let mut tables = self.tables.write().unwrap();
            let uid = order.order_uid.clone();
            tables.orders.entry(uid.clone()).or_insert_with(|| order.clone());
            tables.deliveries.insert(uid.clone(), order.delivery.clone());
            tables.payments.insert(uid.clone(), order.payment.clone());

            let items = tables.items.entry(uid).or_default();
            for item in &order.items {
                if let Some(existing) = items.iter_mut().find(|i| i.rid == item.rid) {
                    *existing = item.clone();
                } else {
                    items.push(item.clone());
                }
            }
            Ok(())
        })
    }

    fn get_order<'a>(
        &'a self,
        order_uid: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Order, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            self.simulate().await?;
            if Self::take_injected_failure(&self.failing_gets) {
                return Err(StoreError::Database("injected read failure".to_string()));
            }
            self.tables
                .read()
                .unwrap()
                .hydrate(order_uid)
                .ok_or_else(|| StoreError::NotFound(order_uid.to_string()))
        })
    }

    fn list_recent_orders(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Order>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.simulate().await?;
            let tables = self.tables.read().unwrap();
            let mut roots: Vec<&Order> = tables.orders.values().collect();
            roots.sort_by(|a, b| b.date_created.cmp(&a.date_created));
            Ok(roots
                .into_iter()
                .take(limit)
                .filter_map(|root| tables.hydrate(&root.order_uid))
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = InMemoryOrderStore::new();
        let order = fixtures::order("A1");

        store.upsert_order(&order).await.unwrap();
        store.upsert_order(&order).await.unwrap();

        assert_eq!(store.order_count(), 1);
        assert_eq!(store.item_count("A1"), 1);
        assert_eq!(store.get_order("A1").await.unwrap(), order);
    }

    #[tokio::test]
    async fn reingest_keeps_first_root_and_replaces_payment() {
        let store = InMemoryOrderStore::new();
        let first = fixtures::order("A1");
        store.upsert_order(&first).await.unwrap();

        let mut second = fixtures::order_created_at("A1", 60);
        second.payment.amount = 9999;
        store.upsert_order(&second).await.unwrap();

        let stored = store.get_order("A1").await.unwrap();
        assert_eq!(stored.payment.amount, 9999);
        assert_eq!(stored.date_created, first.date_created);
    }

    #[tokio::test]
    async fn root_without_sub_records_is_not_found() {
        let store = InMemoryOrderStore::new();
        store.insert_root_only(&fixtures::order("A1"));

        let err = store.get_order("A1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = InMemoryOrderStore::new();
        store.fail_next_upserts(1);

        assert!(store.upsert_order(&fixtures::order("A1")).await.is_err());
        assert!(store.upsert_order(&fixtures::order("A1")).await.is_ok());
        assert_eq!(store.upsert_calls(), 2);
    }

    #[tokio::test]
    async fn injected_read_failures_are_consumed() {
        let store = InMemoryOrderStore::new();
        store.upsert_order(&fixtures::order("A1")).await.unwrap();
        store.fail_next_gets(1);

        assert!(store.get_order("A1").await.is_err());
        assert!(store.get_order("A1").await.is_ok());
        assert_eq!(store.get_calls(), 2);
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let store = InMemoryOrderStore::new();
        for (uid, minutes) in [("old", 0), ("new", 20), ("mid", 10)] {
            store
                .upsert_order(&fixtures::order_created_at(uid, minutes))
                .await
                .unwrap();
        }

        let recent = store.list_recent_orders(2).await.unwrap();
        let uids: Vec<_> = recent.iter().map(|o| o.order_uid.as_str()).collect();
        assert_eq!(uids, vec!["new", "mid"]);
    }
}
