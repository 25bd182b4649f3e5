//! In-memory dead letter queue.

use chrono::Utc;
use order_ingest_core::{
    DeadLetter, DeadLetterQueue, DeadLetterStatus, InboundMessage, IngestError, StoreError,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory dead letter queue for testing.
///
/// Entries are keyed by `(topic, partition, offset)` like the Postgres table.
/// [`set_unavailable`](Self::set_unavailable) makes `record` fail, as when the
/// queue shares a database that is down.
#[derive(Clone, Default)]
pub struct InMemoryDeadLetterQueue {
    entries: Arc<RwLock<Vec<DeadLetter>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryDeadLetterQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `record` fail (or succeed again) with a database error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of every entry regardless of status.
    #[must_use]
    pub fn entries(&self) -> Vec<DeadLetter> {
        self.entries.read().unwrap().clone()
    }

    /// Look up an entry by id.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<DeadLetter> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    fn set_status(&self, id: i64, status: DeadLetterStatus, notes: Option<&str>) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap();
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("dead letter {id}")))?;
        entry.status = status;
        entry.resolution_notes = notes.map(str::to_string);
        Ok(())
    }
}

impl DeadLetterQueue for InMemoryDeadLetterQueue {
    fn record<'a>(
        &'a self,
        message: &'a InboundMessage,
        error: &'a IngestError,
    ) -> Pin<Box<dyn Future<Output = Result<i64, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(StoreError::Database("dead letter queue unavailable".to_string()));
            }
            let now = Utc::now();
            let mut entries = self.entries.write().unwrap();
            if let Some(existing) = entries.iter_mut().find(|e| {
                e.message.topic == message.topic
                    && e.message.partition == message.partition
                    && e.message.offset == message.offset
            }) {
                existing.failure_count += 1;
                existing.last_failed_at = now;
                existing.error_kind = error.kind().to_string();
                existing.error_message = error.to_string();
                existing.status = DeadLetterStatus::Pending;
                return Ok(existing.id);
            }

            let id = i64::try_from(entries.len()).unwrap() + 1;
            entries.push(DeadLetter {
                id,
                message: message.clone(),
                error_kind: error.kind().to_string(),
                error_message: error.to_string(),
                failure_count: 1,
                first_failed_at: now,
                last_failed_at: now,
                status: DeadLetterStatus::Pending,
                resolution_notes: None,
            });
            Ok(id)
        })
    }

    fn list_pending(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DeadLetter>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            Ok(self
                .entries
                .read()
                .unwrap()
                .iter()
                .filter(|e| e.status == DeadLetterStatus::Pending)
                .take(limit)
                .cloned()
                .collect())
        })
    }

    fn mark_resolved(
        &self,
        id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move { self.set_status(id, DeadLetterStatus::Resolved, None) })
    }

    fn mark_discarded<'a>(
        &'a self,
        id: i64,
        reason: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move { self.set_status(id, DeadLetterStatus::Discarded, Some(reason)) })
    }

    fn count_pending(&self) -> Pin<Box<dyn Future<Output = Result<i64, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let count = self
                .entries
                .read()
                .unwrap()
                .iter()
                .filter(|e| e.status == DeadLetterStatus::Pending)
                .count();
            Ok(i64::try_from(count).unwrap())
        })
    }
}
