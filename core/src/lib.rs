//! # Order Ingest Core
//!
//! Core types and traits for the order ingest service.
//!
//! This crate owns the vocabulary every other crate speaks:
//!
//! - **Order aggregate**: [`Order`] with its exactly-one [`Delivery`], exactly-one
//!   [`Payment`] and zero-or-more [`Item`] records, treated as one unit of consistency
//! - **Validation**: structural checks applied to every inbound order
//! - **Errors**: the failure taxonomy shared by the store, the consumer and the read path
//! - **Seams**: [`OrderStore`], [`MessageSource`] and [`DeadLetterQueue`] traits, each
//!   with a production implementation in its own crate and an in-memory double in
//!   `order-ingest-testing`
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//!  │ MessageSource│ ──► │ ingest pipeline│ ──► │  OrderStore  │
//!  │  (Kafka)     │     │ decode+validate│     │  (Postgres)  │
//!  └──────────────┘     └───────┬────────┘     └──────┬───────┘
//!                               │ refresh             │
//!                               ▼                     │
//!                        ┌─────────────┐   miss       │
//!  GET /order/:uid ───►  │ OrderCache  │ ─────────────┘
//!                        └─────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dead_letter;
pub mod error;
pub mod order;
pub mod source;
pub mod store;
pub mod validation;

pub use dead_letter::{DeadLetter, DeadLetterQueue, DeadLetterStatus};
pub use error::{ConnectionError, IngestError, SourceError, StoreError};
pub use order::{Delivery, Item, Order, Payment};
pub use source::{InboundMessage, MessageSource};
pub use store::OrderStore;
pub use validation::{FieldViolation, ValidationError};

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
