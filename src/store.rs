//! Typed access to the jobs table
//!
//! Every read and write of job state goes through `JobStore`; status
//! changes only happen via the guarded conditional update, so a worker
//! that lost a race gets `StaleStatus` instead of clobbering newer state.

use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::fmt;
use thiserror::Error;

use crate::queries::jobs;
use crate::status::JobStatus;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no job found for key {0}")]
    NotFound(JobKey),
    #[error("an unfinished job already exists for key {0}")]
    DuplicateActiveJob(JobKey),
    #[error("job {key} is {actual}, expected {expected}")]
    StaleStatus {
        key: JobKey,
        expected: JobStatus,
        actual: JobStatus,
    },
    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },
    #[error("unrecognized status '{0}' in job row")]
    UnknownStatus(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Composite key identifying the unit of audio a job produces.
///
/// Section-audio jobs are keyed by (section_id, voice_id); narration-chunk
/// jobs by story_id + chunk_index folded into the target id, with no voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobKey {
    pub target_id: String,
    pub voice_id: Option<String>,
}

impl JobKey {
    /// Key for a per-section synthesis job in a given voice
    pub fn section(section_id: &str, voice_id: &str) -> Self {
        JobKey {
            target_id: section_id.to_string(),
            voice_id: Some(voice_id.to_string()),
        }
    }

    /// Key for one chunk of a whole-story narration
    pub fn narration_chunk(story_id: &str, chunk_index: i64) -> Self {
        JobKey {
            target_id: format!("{}#{}", story_id, chunk_index),
            voice_id: None,
        }
    }

    fn voice_id_ref(&self) -> Option<&str> {
        self.voice_id.as_deref()
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.voice_id {
            Some(voice) => write!(f, "({}, {})", self.target_id, voice),
            None => write!(f, "({})", self.target_id),
        }
    }
}

/// A tracked audio-synthesis job row
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: i64,
    pub target_id: String,
    pub voice_id: Option<String>,
    pub parent_id: String,
    pub item_index: i64,
    pub status: JobStatus,
    pub audio_url: Option<String>,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

impl Job {
    pub fn key(&self) -> JobKey {
        JobKey {
            target_id: self.target_id.clone(),
            voice_id: self.voice_id.clone(),
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Job, StoreError> {
        let status_str: String = row.try_get("status")?;
        let status = JobStatus::parse(&status_str)
            .ok_or_else(|| StoreError::UnknownStatus(status_str))?;
        Ok(Job {
            id: row.try_get("id")?,
            target_id: row.try_get("target_id")?,
            voice_id: row.try_get("voice_id")?,
            parent_id: row.try_get("parent_id")?,
            item_index: row.try_get("item_index")?,
            status,
            audio_url: row.try_get("audio_url")?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

/// Request to track a new synthesis job
#[derive(Debug, Clone)]
pub struct NewJob {
    pub key: JobKey,
    /// Story the section or chunk belongs to
    pub parent_id: String,
    /// Position of the section or chunk within the parent
    pub item_index: i64,
}

/// Fields a transition may set alongside the status
#[derive(Debug, Clone, Default)]
pub struct UpdateFields {
    pub audio_url: Option<String>,
    pub error: Option<String>,
}

impl UpdateFields {
    pub fn audio_url(url: &str) -> Self {
        UpdateFields {
            audio_url: Some(url.to_string()),
            error: None,
        }
    }

    pub fn error(reason: &str) -> Self {
        UpdateFields {
            audio_url: None,
            error: Some(reason.to_string()),
        }
    }
}

/// One entry of the aggregated per-story status listing
#[derive(Debug, Clone, Serialize)]
pub struct SectionStatus {
    pub item_index: i64,
    pub status: JobStatus,
    pub updated_at: i64,
    pub error: Option<String>,
}

pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        JobStore { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Track a new job in PENDING
    ///
    /// Fails with `DuplicateActiveJob` if a PENDING or PROCESSING job
    /// already exists for the key. A key whose prior job is terminal gets
    /// a fresh row; the old one stays as history.
    pub async fn create(&self, new: &NewJob, now_ms: i64) -> Result<Job, StoreError> {
        let sql = jobs::insert_if_no_active(
            &new.key.target_id,
            new.key.voice_id_ref(),
            &new.parent_id,
            new.item_index,
            now_ms,
        );
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::DuplicateActiveJob(new.key.clone()));
        }
        self.get_by_key(&new.key).await
    }

    /// Latest job row for a key
    pub async fn get_by_key(&self, key: &JobKey) -> Result<Job, StoreError> {
        let sql = jobs::select_latest_by_key(&key.target_id, key.voice_id_ref());
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Job::from_row(&row),
            None => Err(StoreError::NotFound(key.clone())),
        }
    }

    /// All job rows under a story, history included, ordered by item index
    pub async fn list_by_parent(&self, parent_id: &str) -> Result<Vec<Job>, StoreError> {
        let sql = jobs::select_by_parent(parent_id);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Job::from_row).collect()
    }

    /// Worker-path status transition
    ///
    /// Rejects edges outside PENDING -> PROCESSING -> {COMPLETE | ERROR}
    /// with `IllegalTransition` before touching the store, then applies
    /// the guarded conditional write.
    pub async fn update(
        &self,
        key: &JobKey,
        expected: JobStatus,
        new_status: JobStatus,
        fields: &UpdateFields,
        now_ms: i64,
    ) -> Result<Job, StoreError> {
        if !expected.can_transition_to(new_status) {
            return Err(StoreError::IllegalTransition {
                from: expected,
                to: new_status,
            });
        }
        self.guarded_update(key, expected, new_status, fields, now_ms)
            .await
    }

    /// Conditional write: commits status, fields and timestamps together,
    /// or not at all when the stored status no longer matches `expected`.
    ///
    /// Also the administrative override path used by the recovery
    /// operator, which supplies its own guard.
    pub(crate) async fn guarded_update(
        &self,
        key: &JobKey,
        expected: JobStatus,
        new_status: JobStatus,
        fields: &UpdateFields,
        now_ms: i64,
    ) -> Result<Job, StoreError> {
        let sql = jobs::guarded_update(
            &key.target_id,
            key.voice_id_ref(),
            expected,
            new_status,
            fields.audio_url.as_deref(),
            fields.error.as_deref(),
            now_ms,
        );
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            // Distinguish a missing job from a lost race
            let current = self.get_by_key(key).await?;
            return Err(StoreError::StaleStatus {
                key: key.clone(),
                expected,
                actual: current.status,
            });
        }
        self.get_by_key(key).await
    }

    /// Jobs still in PROCESSING whose updated_at predates the cutoff
    pub async fn processing_stalled_before(&self, cutoff_ms: i64) -> Result<Vec<Job>, StoreError> {
        let sql = jobs::select_processing_before(cutoff_ms);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Job::from_row).collect()
    }

    /// Stalled PROCESSING jobs restricted to one story
    pub async fn processing_stalled_before_under_parent(
        &self,
        parent_id: &str,
        cutoff_ms: i64,
    ) -> Result<Vec<Job>, StoreError> {
        let sql = jobs::select_processing_before_under_parent(parent_id, cutoff_ms);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Job::from_row).collect()
    }

    /// Aggregated per-story listing: one entry per section/chunk index,
    /// reflecting the latest job for that index. Read directly from the
    /// store on every call; nothing is cached.
    pub async fn status_by_parent(
        &self,
        parent_id: &str,
    ) -> Result<Vec<SectionStatus>, StoreError> {
        let sql = jobs::select_status_by_parent(parent_id);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let status_str: String = row.try_get("status")?;
                let status = JobStatus::parse(&status_str)
                    .ok_or_else(|| StoreError::UnknownStatus(status_str))?;
                Ok(SectionStatus {
                    item_index: row.try_get("item_index")?,
                    status,
                    updated_at: row.try_get("updated_at")?,
                    error: row.try_get("error")?,
                })
            })
            .collect()
    }
}
