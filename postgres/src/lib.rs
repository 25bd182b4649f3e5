//! `PostgreSQL` storage for the order ingest service.
//!
//! This crate implements the storage traits from `order-ingest-core` with sqlx:
//!
//! - [`PostgresOrderStore`]: transactional multi-table order upsert and lookup
//! - [`PostgresDeadLetterQueue`]: persistent record of messages that failed ingestion
//!
//! The tables are defined in `schema.sql` at the crate root ([`SCHEMA`]).
//!
//! # Example
//!
//! ```no_run
//! use order_ingest_postgres::{PostgresDeadLetterQueue, PostgresOrderStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresOrderStore::connect("postgres://localhost/orders", 10).await?;
//! let dead_letters = PostgresDeadLetterQueue::new(store.pool().clone());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dead_letter_queue;
pub mod order_store;

pub use dead_letter_queue::PostgresDeadLetterQueue;
pub use order_store::{PostgresOrderStore, SCHEMA};
