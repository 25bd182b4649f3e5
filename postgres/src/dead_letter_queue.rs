//! `PostgreSQL`-backed dead letter queue for failed messages.
//!
//! Entries live in `failed_messages`, keyed by the message's broker coordinates.
//! Recording the same message again bumps its failure count and puts it back in
//! the pending state instead of creating a duplicate.

use chrono::{DateTime, Utc};
use order_ingest_core::{
    DeadLetter, DeadLetterQueue, DeadLetterStatus, InboundMessage, IngestError, StoreError,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;

/// `PostgreSQL`-based dead letter queue.
///
/// # Example
///
/// ```no_run
/// use order_ingest_postgres::PostgresDeadLetterQueue;
/// use order_ingest_core::DeadLetterQueue;
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let dlq = PostgresDeadLetterQueue::new(pool);
///
/// let pending = dlq.list_pending(100).await?;
/// println!("Pending failures: {}", pending.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresDeadLetterQueue {
    pool: PgPool,
}

impl PostgresDeadLetterQueue {
    /// Create a new dead letter queue with the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a specific entry by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no entry has this ID, or
    /// [`StoreError::Database`] if the query fails.
    pub async fn get_by_id(&self, id: i64) -> Result<DeadLetter, StoreError> {
        let row = sqlx::query(
            r"
            SELECT
                id, topic, partition_id, message_offset, message_key, payload,
                error_kind, error_message, failure_count,
                first_failed_at, last_failed_at, status, resolution_notes
            FROM failed_messages
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
        .ok_or_else(|| StoreError::NotFound(format!("dead letter {id}")))?;

        Self::row_to_dead_letter(&row)
    }

    async fn set_status(
        &self,
        id: i64,
        status: DeadLetterStatus,
        notes: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE failed_messages
            SET status = $1,
                resolved_at = NOW(),
                resolution_notes = $2
            WHERE id = $3
            ",
        )
        .bind(status.as_str())
        .bind(notes)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("dead letter {id}")));
        }
        Ok(())
    }

    fn row_to_dead_letter(row: &PgRow) -> Result<DeadLetter, StoreError> {
        let decode = |e: sqlx::Error| StoreError::Database(format!("Failed to decode dead letter: {e}"));

        let status: String = row.try_get("status").map_err(decode)?;
        let first_failed_at: DateTime<Utc> = row.try_get("first_failed_at").map_err(decode)?;
        let last_failed_at: DateTime<Utc> = row.try_get("last_failed_at").map_err(decode)?;

        Ok(DeadLetter {
            id: row.try_get("id").map_err(decode)?,
            message: InboundMessage {
                topic: row.try_get("topic").map_err(decode)?,
                partition: row.try_get("partition_id").map_err(decode)?,
                offset: row.try_get("message_offset").map_err(decode)?,
                key: row.try_get("message_key").map_err(decode)?,
                payload: row.try_get("payload").map_err(decode)?,
            },
            error_kind: row.try_get("error_kind").map_err(decode)?,
            error_message: row.try_get("error_message").map_err(decode)?,
            failure_count: row.try_get("failure_count").map_err(decode)?,
            first_failed_at,
            last_failed_at,
            status: DeadLetterStatus::parse(&status)?,
            resolution_notes: row.try_get("resolution_notes").map_err(decode)?,
        })
    }
}

impl DeadLetterQueue for PostgresDeadLetterQueue {
    fn record<'a>(
        &'a self,
        message: &'a InboundMessage,
        error: &'a IngestError,
    ) -> Pin<Box<dyn Future<Output = Result<i64, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let (id,): (i64,) = sqlx::query_as(
                r"
                INSERT INTO failed_messages (
                    topic, partition_id, message_offset, message_key, payload,
                    error_kind, error_message
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (topic, partition_id, message_offset) DO UPDATE
                SET error_kind = EXCLUDED.error_kind,
                    error_message = EXCLUDED.error_message,
                    failure_count = failed_messages.failure_count + 1,
                    last_failed_at = NOW(),
                    status = 'pending',
                    resolved_at = NULL,
                    resolution_notes = NULL
                RETURNING id
                ",
            )
            .bind(&message.topic)
            .bind(message.partition)
            .bind(message.offset)
            .bind(message.key.as_deref())
            .bind(&message.payload)
            .bind(error.kind())
            .bind(error.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            tracing::warn!(
                dlq_id = id,
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                kind = error.kind(),
                "Message added to dead letter queue"
            );

            Ok(id)
        })
    }

    fn list_pending(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DeadLetter>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT
                    id, topic, partition_id, message_offset, message_key, payload,
                    error_kind, error_message, failure_count,
                    first_failed_at, last_failed_at, status, resolution_notes
                FROM failed_messages
                WHERE status = 'pending'
                ORDER BY first_failed_at ASC, id ASC
                LIMIT $1
                ",
            )
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            rows.iter().map(Self::row_to_dead_letter).collect()
        })
    }

    fn mark_resolved(
        &self,
        id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.set_status(id, DeadLetterStatus::Resolved, None).await?;
            tracing::info!(dlq_id = id, "Dead letter marked as resolved");
            Ok(())
        })
    }

    fn mark_discarded<'a>(
        &'a self,
        id: i64,
        reason: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.set_status(id, DeadLetterStatus::Discarded, Some(reason))
                .await?;
            tracing::warn!(dlq_id = id, reason, "Dead letter marked as discarded");
            Ok(())
        })
    }

    fn count_pending(&self) -> Pin<Box<dyn Future<Output = Result<i64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as(
                r"
                SELECT COUNT(*)
                FROM failed_messages
                WHERE status = 'pending'
                ",
            )
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            Ok(count)
        })
    }
}
