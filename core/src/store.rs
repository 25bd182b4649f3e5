//! Order store trait.
//!
//! The store owns transaction boundaries and idempotency for the order aggregate.
//!
//! # Implementations
//!
//! - `PostgresOrderStore` (in `order-ingest-postgres`): production implementation
//! - `InMemoryOrderStore` (in `order-ingest-testing`): fast, deterministic testing
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the store can
//! be shared as `Arc<dyn OrderStore>` between the consumer task and HTTP handlers.

use crate::error::StoreError;
use crate::order::Order;
use std::future::Future;
use std::pin::Pin;

/// Durable storage for order aggregates.
pub trait OrderStore: Send + Sync {
    /// Persist an order aggregate atomically.
    ///
    /// Within a single transaction:
    ///
    /// 1. insert the root row, ignoring a conflict on `order_uid` (the first
    ///    `date_created` is preserved)
    /// 2. upsert the delivery record (conflict replaces every field)
    /// 3. upsert the payment record (conflict replaces every field)
    /// 4. upsert each item on `(order_uid, rid)`
    ///
    /// Any failure rolls the whole transaction back; readers never observe a
    /// partial aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if any write or the commit fails.
    fn upsert_order<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// Load a complete order aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the root row is missing or lacks its
    /// delivery or payment record, and [`StoreError::Database`] on query failure.
    fn get_order<'a>(
        &'a self,
        order_uid: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Order, StoreError>> + Send + 'a>>;

    /// Load up to `limit` most recently created orders, newest first.
    ///
    /// Used once at startup to warm the cache.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    fn list_recent_orders(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Order>, StoreError>> + Send + '_>>;
}
