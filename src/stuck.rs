//! Stuck-job detection
//!
//! A job is stuck when it sits in PROCESSING with no update for longer
//! than the timeout. Workers give no liveness signal beyond refreshing
//! updated_at, so staleness is the only recovery trigger. Detection is a
//! pure read; the remedy is a separate step (see recover).

use std::time::Duration;

use crate::store::{Job, JobStore, StoreError};

/// All jobs with status = PROCESSING and now - updated_at >= timeout
pub async fn find_stuck(
    store: &JobStore,
    timeout: Duration,
    now_ms: i64,
) -> Result<Vec<Job>, StoreError> {
    let cutoff_ms = now_ms - timeout.as_millis() as i64;
    store.processing_stalled_before(cutoff_ms).await
}

/// Stuck jobs restricted to one story, for story-scoped recovery sweeps
pub async fn find_stuck_under_parent(
    store: &JobStore,
    parent_id: &str,
    timeout: Duration,
    now_ms: i64,
) -> Result<Vec<Job>, StoreError> {
    let cutoff_ms = now_ms - timeout.as_millis() as i64;
    store
        .processing_stalled_before_under_parent(parent_id, cutoff_ms)
        .await
}
