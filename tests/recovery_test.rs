use tempfile::TempDir;
use tokio::runtime::Runtime;

use story_audio_jobs::constants::TIMED_OUT_ERROR;
use story_audio_jobs::db;
use story_audio_jobs::recover::{self, RecoveryOutcome};
use story_audio_jobs::status::JobStatus;
use story_audio_jobs::store::{JobKey, JobStore, NewJob, StoreError, UpdateFields};
use story_audio_jobs::stuck;

/// Helper to create a temp-file job store
/// Returns (rt, store, _guard) - keep _guard alive to prevent temp file deletion
fn create_test_store() -> (Runtime, JobStore, TempDir) {
    let rt = Runtime::new().unwrap();
    let (pool, guard) = rt.block_on(async {
        let (pool, guard) = db::create_test_connection_in_temporary_file()
            .await
            .unwrap();
        db::init_database_schema(&pool).await.unwrap();
        (pool, guard)
    });
    (rt, JobStore::new(pool), guard)
}

/// Create a job and walk it into PROCESSING at the given timestamp
async fn processing_job(
    store: &JobStore,
    section: &str,
    voice: &str,
    story: &str,
    index: i64,
    created_ms: i64,
    processing_ms: i64,
) -> JobKey {
    let new = NewJob {
        key: JobKey::section(section, voice),
        parent_id: story.to_string(),
        item_index: index,
    };
    store.create(&new, created_ms).await.unwrap();
    store
        .update(
            &new.key,
            JobStatus::Pending,
            JobStatus::Processing,
            &UpdateFields::default(),
            processing_ms,
        )
        .await
        .unwrap();
    new.key
}

#[test]
fn stuck_job_detected_and_force_failed() {
    let (rt, store, _guard) = create_test_store();
    rt.block_on(async {
        // Created at t=0s, PROCESSING at t=1s, never updated again
        let key = processing_job(&store, "sec-1", "v-1", "story-1", 0, 0, 1_000).await;

        // Detector at t=301s with a 300s timeout finds it
        let stuck_jobs = store_stuck(&store, 300, 301_000).await;
        assert_eq!(stuck_jobs.len(), 1);
        assert_eq!(stuck_jobs[0].key(), key);

        let outcome = recover::force_fail(&store, &key, "processing timed out", 301_000)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RecoveryOutcome::Applied {
                prior: JobStatus::Processing,
                new: JobStatus::Error,
            }
        );

        let job = store.get_by_key(&key).await.unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.error.as_deref(), Some("processing timed out"));
        assert_eq!(job.completed_at, Some(301_000));
        assert_eq!(job.updated_at, 301_000);
        assert_eq!(job.audio_url, None);
    });
}

async fn store_stuck(
    store: &JobStore,
    timeout_secs: u64,
    now_ms: i64,
) -> Vec<story_audio_jobs::store::Job> {
    stuck::find_stuck(store, std::time::Duration::from_secs(timeout_secs), now_ms)
        .await
        .unwrap()
}

#[test]
fn force_complete_records_the_artifact() {
    let (rt, store, _guard) = create_test_store();
    rt.block_on(async {
        let key = processing_job(&store, "sec-1", "v-1", "story-1", 0, 0, 1_000).await;

        let outcome = recover::force_complete(&store, &key, "/audio/x.wav", 400_000)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RecoveryOutcome::Applied {
                prior: JobStatus::Processing,
                new: JobStatus::Complete,
            }
        );

        let job = store.get_by_key(&key).await.unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.audio_url.as_deref(), Some("/audio/x.wav"));
        assert_eq!(job.error, None);
        assert_eq!(job.completed_at, Some(400_000));
    });
}

#[test]
fn recovery_is_idempotent() {
    let (rt, store, _guard) = create_test_store();
    rt.block_on(async {
        let key = processing_job(&store, "sec-1", "v-1", "story-1", 0, 0, 1_000).await;

        let first = recover::force_fail(&store, &key, "processing timed out", 400_000)
            .await
            .unwrap();
        assert!(matches!(first, RecoveryOutcome::Applied { .. }));

        // Second invocation reports a no-op and changes nothing
        let second = recover::force_fail(&store, &key, "processing timed out", 500_000)
            .await
            .unwrap();
        assert_eq!(second, RecoveryOutcome::AlreadyInTargetState);

        let job = store.get_by_key(&key).await.unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.updated_at, 400_000);
        assert_eq!(job.completed_at, Some(400_000));
    });
}

#[test]
fn worker_finishing_first_wins_the_race() {
    let (rt, store, _guard) = create_test_store();
    rt.block_on(async {
        let key = processing_job(&store, "sec-1", "v-1", "story-1", 0, 0, 1_000).await;

        // Worker completes between detection and recovery
        store
            .update(
                &key,
                JobStatus::Processing,
                JobStatus::Complete,
                &UpdateFields::audio_url("/api/audio/real.wav"),
                350_000,
            )
            .await
            .unwrap();

        let outcome = recover::force_fail(&store, &key, "processing timed out", 400_000)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RecoveryOutcome::NoLongerProcessing {
                actual: JobStatus::Complete,
            }
        );

        // The worker's result is untouched
        let job = store.get_by_key(&key).await.unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.audio_url.as_deref(), Some("/api/audio/real.wav"));
        assert_eq!(job.error, None);
    });
}

#[test]
fn applied_overrides_are_logged() {
    let (rt, store, _guard) = create_test_store();
    rt.block_on(async {
        let key = processing_job(&store, "sec-1", "v-1", "story-1", 0, 0, 1_000).await;
        recover::force_fail(&store, &key, "processing timed out", 400_000)
            .await
            .unwrap();
        // No-op invocations leave no audit entry
        recover::force_fail(&store, &key, "processing timed out", 500_000)
            .await
            .unwrap();

        let records = recover::log_for_target(&store, "sec-1").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "force-fail");
        assert_eq!(records[0].prior_status, "PROCESSING");
        assert_eq!(records[0].new_status, "ERROR");
        assert_eq!(records[0].detail.as_deref(), Some("processing timed out"));
        assert_eq!(records[0].performed_at, 400_000);

        // Unrecovered targets have an empty trail
        let none = recover::log_for_target(&store, "sec-2").await.unwrap();
        assert!(none.is_empty());
    });
}

#[test]
fn story_sweep_force_fails_only_stuck_jobs() {
    let (rt, store, _guard) = create_test_store();
    rt.block_on(async {
        // Two stalled jobs, one fresh, one already complete
        processing_job(&store, "sec-1", "v-1", "story-1", 0, 0, 1_000).await;
        processing_job(&store, "sec-2", "v-1", "story-1", 1, 0, 2_000).await;
        processing_job(&store, "sec-3", "v-1", "story-1", 2, 0, 390_000).await;
        let done = processing_job(&store, "sec-4", "v-1", "story-1", 3, 0, 1_000).await;
        store
            .update(
                &done,
                JobStatus::Processing,
                JobStatus::Complete,
                &UpdateFields::audio_url("/api/audio/done.wav"),
                5_000,
            )
            .await
            .unwrap();
        // A stalled job under another story is out of scope
        processing_job(&store, "sec-9", "v-1", "story-2", 0, 0, 1_000).await;

        let outcomes = recover::force_fail_stuck_under_parent(
            &store,
            "story-1",
            std::time::Duration::from_secs(300),
            TIMED_OUT_ERROR,
            400_000,
        )
        .await
        .unwrap();

        assert_eq!(outcomes.len(), 2);
        for (_, outcome) in &outcomes {
            assert!(matches!(outcome, RecoveryOutcome::Applied { .. }));
        }

        let statuses = store.status_by_parent("story-1").await.unwrap();
        let by_index: Vec<JobStatus> = statuses.iter().map(|s| s.status).collect();
        assert_eq!(
            by_index,
            vec![
                JobStatus::Error,
                JobStatus::Error,
                JobStatus::Processing,
                JobStatus::Complete,
            ]
        );

        // The recorded reason matches the administrative message verbatim
        let failed = store
            .get_by_key(&JobKey::section("sec-1", "v-1"))
            .await
            .unwrap();
        assert_eq!(
            failed.error.as_deref(),
            Some("Processing timed out (reset by admin)")
        );

        // The other story was left alone
        let other = store
            .get_by_key(&JobKey::section("sec-9", "v-1"))
            .await
            .unwrap();
        assert_eq!(other.status, JobStatus::Processing);
    });
}

#[test]
fn recovery_on_missing_job_is_not_found() {
    let (rt, store, _guard) = create_test_store();
    rt.block_on(async {
        let key = JobKey::section("no-such-section", "v-1");
        let err = recover::force_fail(&store, &key, "processing timed out", 1_000)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    });
}
