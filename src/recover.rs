//! Recovery operator
//!
//! Two mutually exclusive remedies for a stuck job, both guarded on the
//! job still being in PROCESSING. A worker finishing between detection
//! and recovery wins the race; the guard turns our write into a no-op
//! and the caller sees success-by-race, not a failure. Every applied
//! override is recorded in the recovery_log table.

use log::{info, warn};
use serde::Serialize;
use sqlx::Row;

use crate::queries::recovery_log;
use crate::status::JobStatus;
use crate::store::{JobKey, JobStore, StoreError, UpdateFields};

/// How a recovery invocation resolved. All three are success to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The guarded update committed
    Applied {
        prior: JobStatus,
        new: JobStatus,
    },
    /// The job was already in the requested terminal state
    AlreadyInTargetState,
    /// The job left PROCESSING before we got to it (worker won the race)
    NoLongerProcessing { actual: JobStatus },
}

/// Force a stuck job to COMPLETE
///
/// For when out-of-band evidence proves the synthesis actually finished:
/// records the known artifact location and stamps completed_at.
pub async fn force_complete(
    store: &JobStore,
    key: &JobKey,
    audio_url: &str,
    now_ms: i64,
) -> Result<RecoveryOutcome, StoreError> {
    apply(
        store,
        key,
        JobStatus::Complete,
        &UpdateFields::audio_url(audio_url),
        "force-complete",
        Some(audio_url),
        now_ms,
    )
    .await
}

/// Force a stuck job to ERROR
///
/// For when no evidence of completion exists; the reason lands in the
/// job's error field as data, not as an exception to the caller.
pub async fn force_fail(
    store: &JobStore,
    key: &JobKey,
    reason: &str,
    now_ms: i64,
) -> Result<RecoveryOutcome, StoreError> {
    apply(
        store,
        key,
        JobStatus::Error,
        &UpdateFields::error(reason),
        "force-fail",
        Some(reason),
        now_ms,
    )
    .await
}

async fn apply(
    store: &JobStore,
    key: &JobKey,
    target_status: JobStatus,
    fields: &UpdateFields,
    action: &str,
    detail: Option<&str>,
    now_ms: i64,
) -> Result<RecoveryOutcome, StoreError> {
    match store
        .guarded_update(key, JobStatus::Processing, target_status, fields, now_ms)
        .await
    {
        Ok(job) => {
            let sql = recovery_log::insert(
                &key.target_id,
                key.voice_id.as_deref(),
                action,
                JobStatus::Processing.as_str(),
                target_status.as_str(),
                detail,
                now_ms,
            );
            sqlx::query(&sql).execute(store.pool()).await?;
            info!("{} applied to job {}: PROCESSING -> {}", action, key, job.status);
            Ok(RecoveryOutcome::Applied {
                prior: JobStatus::Processing,
                new: job.status,
            })
        }
        Err(StoreError::StaleStatus { actual, .. }) => {
            if actual == target_status {
                info!("{} on job {}: already {}, nothing to do", action, key, actual);
                Ok(RecoveryOutcome::AlreadyInTargetState)
            } else {
                warn!(
                    "{} on job {}: no longer PROCESSING (now {}), leaving as-is",
                    action, key, actual
                );
                Ok(RecoveryOutcome::NoLongerProcessing { actual })
            }
        }
        Err(e) => Err(e),
    }
}

/// One applied override from the recovery_log table
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryRecord {
    pub action: String,
    pub prior_status: String,
    pub new_status: String,
    pub detail: Option<String>,
    pub performed_at: i64,
}

/// Audit trail for a target, oldest first
pub async fn log_for_target(
    store: &JobStore,
    target_id: &str,
) -> Result<Vec<RecoveryRecord>, StoreError> {
    let sql = recovery_log::select_by_target(target_id);
    let rows = sqlx::query(&sql).fetch_all(store.pool()).await?;
    rows.iter()
        .map(|row| {
            Ok(RecoveryRecord {
                action: row.try_get("action")?,
                prior_status: row.try_get("prior_status")?,
                new_status: row.try_get("new_status")?,
                detail: row.try_get("detail")?,
                performed_at: row.try_get("performed_at")?,
            })
        })
        .collect()
}

/// Force-fail every stuck job under a story
///
/// The story-wide sweep: finds all PROCESSING jobs under the parent that
/// stalled past the timeout and force-fails each one. Per-job races are
/// tolerated individually.
pub async fn force_fail_stuck_under_parent(
    store: &JobStore,
    parent_id: &str,
    timeout: std::time::Duration,
    reason: &str,
    now_ms: i64,
) -> Result<Vec<(JobKey, RecoveryOutcome)>, StoreError> {
    let stuck = crate::stuck::find_stuck_under_parent(store, parent_id, timeout, now_ms).await?;
    let mut outcomes = Vec::with_capacity(stuck.len());
    for job in stuck {
        let key = job.key();
        let outcome = force_fail(store, &key, reason, now_ms).await?;
        outcomes.push((key, outcome));
    }
    Ok(outcomes)
}
