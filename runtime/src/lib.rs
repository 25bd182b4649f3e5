//! # Order Ingest Runtime
//!
//! Runtime components of the order ingest service: everything between the
//! infrastructure traits in `order-ingest-core` and the binaries.
//!
//! ## Core Components
//!
//! - [`OrderCache`]: bounded LRU cache of complete orders, shared via `Arc`
//! - [`IngestPipeline`]: decode → validate → upsert → re-read → cache
//! - [`IngestionConsumer`]: single-task loop over a
//!   [`MessageSource`](order_ingest_core::MessageSource), acknowledging only
//!   durable, cached orders
//! - [`OrderReader`]: cache-then-store read path and startup warm
//! - [`replay_pending`]: startup replay of dead-lettered messages
//! - [`retry`](retry::retry): fixed-delay retry helper driven by a [`RetryPolicy`]
//!
//! ## Example
//!
//! ```rust
//! use order_ingest_runtime::{IngestPipeline, OrderCache, OrderReader};
//! use order_ingest_testing::{fixtures, InMemoryOrderStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryOrderStore::new());
//! let cache = Arc::new(OrderCache::default());
//!
//! let pipeline = IngestPipeline::new(store.clone(), Arc::clone(&cache));
//! pipeline.ingest(&fixtures::payload(&fixtures::order("A1"))).await?;
//!
//! let reader = OrderReader::new(store, cache);
//! assert_eq!(reader.get_order_for_read("A1").await?.order_uid, "A1");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod consumer;
pub mod ingest;
pub mod metrics;
pub mod read;
pub mod replay;
pub mod retry;

pub use cache::OrderCache;
pub use consumer::{ConsumerStats, IngestionConsumer, MessageOutcome};
pub use ingest::IngestPipeline;
pub use read::OrderReader;
pub use replay::{ReplaySummary, replay_pending};
pub use retry::{RetryExhausted, RetryPolicy};
