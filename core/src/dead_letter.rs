//! Dead letter queue for messages that failed ingestion.
//!
//! On a Kafka-compatible broker, committing a later offset implicitly commits every
//! earlier offset of the same partition. A failed message that is left
//! unacknowledged is therefore only redelivered if the process restarts before a
//! later message is committed. The dead letter queue closes that gap: every failed
//! message is recorded with its failure, and pending entries are replayed through
//! the normal ingestion pipeline at startup.

use crate::error::{IngestError, StoreError};
use crate::source::InboundMessage;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Status of a dead-lettered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterStatus {
    /// Waiting for replay
    Pending,
    /// Replayed successfully
    Resolved,
    /// Permanently rejected (replay cannot fix it)
    Discarded,
}

impl DeadLetterStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Discarded => "discarded",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "discarded" => Ok(Self::Discarded),
            _ => Err(StoreError::Database(format!(
                "Invalid dead letter status: {s}"
            ))),
        }
    }
}

/// An entry in the dead letter queue.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// Unique identifier for this entry
    pub id: i64,
    /// The message that failed, with its original coordinates
    pub message: InboundMessage,
    /// Failure label ([`IngestError::kind`])
    pub error_kind: String,
    /// Failure description
    pub error_message: String,
    /// How many times this message has failed
    pub failure_count: i32,
    /// When this message first failed
    pub first_failed_at: DateTime<Utc>,
    /// When this message most recently failed
    pub last_failed_at: DateTime<Utc>,
    /// Current status
    pub status: DeadLetterStatus,
    /// Why the entry was discarded, if it was
    pub resolution_notes: Option<String>,
}

/// Persistent record of failed messages.
///
/// Entries are keyed by the message's `(topic, partition, offset)`: recording the
/// same message twice bumps its failure count instead of adding a second entry.
pub trait DeadLetterQueue: Send + Sync {
    /// Record a failed message, returning the entry id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    fn record<'a>(
        &'a self,
        message: &'a InboundMessage,
        error: &'a IngestError,
    ) -> Pin<Box<dyn Future<Output = Result<i64, StoreError>> + Send + 'a>>;

    /// List pending entries, oldest failure first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn list_pending(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DeadLetter>, StoreError>> + Send + '_>>;

    /// Mark an entry as successfully replayed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    fn mark_resolved(
        &self,
        id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Mark an entry as permanently failed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    fn mark_discarded<'a>(
        &'a self,
        id: i64,
        reason: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// Count pending entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    fn count_pending(&self) -> Pin<Box<dyn Future<Output = Result<i64, StoreError>> + Send + '_>>;
}
