//! Error taxonomy shared across the service.
//!
//! | Error              | Raised by               | Consequence                                 |
//! |--------------------|-------------------------|---------------------------------------------|
//! | [`ConnectionError`]| storage bootstrap       | fatal to startup                            |
//! | [`IngestError`]    | ingestion pipeline      | message not acknowledged, consumer continues |
//! | [`StoreError`]     | order store             | transaction rolled back, error propagated   |
//! | [`SourceError`]    | message source          | logged, consumer keeps polling              |

use crate::validation::ValidationError;
use std::time::Duration;
use thiserror::Error;

/// Errors from order store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No complete aggregate exists for the identifier.
    ///
    /// A root row missing its delivery or payment record is reported as not found,
    /// never as a partially populated order.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// Database connection, query or transaction failure.
    #[error("Database error: {0}")]
    Database(String),

    /// The operation did not finish within its deadline.
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Whether this error means "does not exist" rather than "could not be determined".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Failure to process one inbound message.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Payload is not a well-formed order object.
    #[error("Malformed order payload: {0}")]
    Format(#[from] serde_json::Error),

    /// Payload decoded but the order is structurally invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Persisting or re-reading the order failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Short, stable label for logs, metrics and dead-letter records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Format(_) => "format",
            Self::Validation(_) => "validation",
            Self::Store(StoreError::Timeout(_)) => "timeout",
            Self::Store(_) => "store",
        }
    }

    /// Whether retrying the same payload can never succeed.
    ///
    /// Format and validation failures are properties of the payload itself; store
    /// failures may clear once the database recovers.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Format(_) | Self::Validation(_))
    }
}

/// Failure to connect to a required resource during startup.
#[derive(Error, Debug, Clone)]
#[error("Failed to connect to {resource} after {attempts} attempts: {last_error}")]
pub struct ConnectionError {
    /// The resource being connected to (e.g. "postgres")
    pub resource: String,
    /// Number of attempts made
    pub attempts: usize,
    /// The error reported by the final attempt
    pub last_error: String,
}

/// Errors from the message source.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// Could not create or subscribe the underlying consumer.
    #[error("Source connection failed: {0}")]
    Connection(String),

    /// Receiving the next message failed.
    #[error("Failed to receive message: {0}")]
    Receive(String),

    /// Committing a processed message failed.
    #[error("Failed to acknowledge message at {topic}/{partition}@{offset}: {reason}")]
    Acknowledge {
        /// Topic of the message
        topic: String,
        /// Partition of the message
        partition: i32,
        /// Offset of the message
        offset: i64,
        /// Underlying failure
        reason: String,
    },

    /// The source has no more messages and never will.
    #[error("Message source closed")]
    Closed,
}
