//! # Order Ingest Testing
//!
//! Testing utilities for the order ingest service.
//!
//! This crate provides:
//! - [`InMemoryOrderStore`]: `HashMap`-backed [`OrderStore`](order_ingest_core::OrderStore)
//!   with the same idempotency rules as the Postgres store, plus failure injection
//! - [`InMemoryMessageSource`]: channel-backed
//!   [`MessageSource`](order_ingest_core::MessageSource) that records acknowledgments
//! - [`InMemoryDeadLetterQueue`]: in-memory
//!   [`DeadLetterQueue`](order_ingest_core::DeadLetterQueue)
//! - [`fixtures`]: sample orders and payloads
//!
//! ## Example
//!
//! ```
//! use order_ingest_testing::{fixtures, InMemoryOrderStore};
//! use order_ingest_core::OrderStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryOrderStore::new();
//! store.upsert_order(&fixtures::order("A1")).await?;
//! assert_eq!(store.get_order("A1").await?.order_uid, "A1");
//! # Ok(())
//! # }
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

pub mod dead_letter;
pub mod fixtures;
pub mod source;
pub mod store;

pub use dead_letter::InMemoryDeadLetterQueue;
pub use source::InMemoryMessageSource;
pub use store::InMemoryOrderStore;
