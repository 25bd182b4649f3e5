//! Kafka-compatible messaging for the order ingest service.
//!
//! This crate provides the broker side of ingestion using rdkafka. It works with
//! Redpanda, Apache Kafka or any other broker speaking the Kafka protocol.
//!
//! - [`KafkaOrderSource`]: [`MessageSource`](order_ingest_core::MessageSource)
//!   over one topic with manual offset commits
//! - [`GroupIdentity`]: fixed or time-derived consumer group ids
//! - [`probe_brokers`]: bare TCP reachability check used while waiting for the
//!   broker at startup
//! - [`KafkaOrderPublisher`]: producer used to feed orders into the topic
//!
//! # Delivery Semantics
//!
//! **At-least-once** with manual commits:
//! - an offset is committed only after the order is stored and cached
//! - if the process stops before the commit, the message is redelivered
//! - the store upsert is idempotent, so redelivery is harmless
//! - ordering is preserved within a partition
//!
//! ```text
//!   broker ──recv──► KafkaOrderSource ──► IngestionConsumer ──► store + cache
//!      ▲                                        │
//!      └────────────── commit(offset + 1) ◄─────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod group;
pub mod probe;
pub mod publisher;
pub mod source;

pub use group::GroupIdentity;
pub use probe::{probe_broker, probe_brokers};
pub use publisher::{KafkaOrderPublisher, PublishError};
pub use source::{KafkaOrderSource, KafkaOrderSourceBuilder};
