//! Startup replay of dead-lettered messages.
//!
//! A commit of a later offset implicitly covers earlier uncommitted ones, so a
//! message that failed while the consumer kept going is not redelivered by the
//! broker. Replay gives those messages another pass through the same pipeline.

use crate::ingest::IngestPipeline;
use order_ingest_core::{DeadLetterQueue, StoreError};
use tracing::{info, warn};

/// Result of one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Entries ingested successfully and marked resolved
    pub resolved: usize,
    /// Entries that can never succeed, marked discarded
    pub discarded: usize,
    /// Entries that failed again on a transient error and stay pending
    pub still_pending: usize,
}

/// Replay up to `limit` pending dead letters through `pipeline`.
///
/// Success marks the entry resolved. Format and validation failures mark it
/// discarded. Store failures leave it pending for the next start.
///
/// # Errors
///
/// Returns the dead letter queue's error if pending entries cannot be listed or an
/// entry's status cannot be updated.
pub async fn replay_pending(
    dead_letters: &dyn DeadLetterQueue,
    pipeline: &IngestPipeline,
    limit: usize,
) -> Result<ReplaySummary, StoreError> {
    let pending = dead_letters.list_pending(limit).await?;
    let mut summary = ReplaySummary::default();

    for entry in pending {
        match pipeline.ingest(&entry.message.payload).await {
            Ok(order) => {
                dead_letters.mark_resolved(entry.id).await?;
                info!(id = entry.id, order_uid = %order.order_uid, "Replayed dead letter");
                summary.resolved += 1;
            }
            Err(e) if e.is_permanent() => {
                dead_letters.mark_discarded(entry.id, &e.to_string()).await?;
                warn!(id = entry.id, kind = e.kind(), error = %e, "Discarded dead letter");
                summary.discarded += 1;
            }
            Err(e) => {
                warn!(id = entry.id, error = %e, "Dead letter replay failed, keeping pending");
                summary.still_pending += 1;
            }
        }
    }

    info!(
        resolved = summary.resolved,
        discarded = summary.discarded,
        still_pending = summary.still_pending,
        "Dead letter replay finished"
    );
    Ok(summary)
}
