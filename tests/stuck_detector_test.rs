use std::time::Duration;
use tempfile::TempDir;
use tokio::runtime::Runtime;

use story_audio_jobs::db;
use story_audio_jobs::status::JobStatus;
use story_audio_jobs::store::{JobKey, JobStore, NewJob, UpdateFields};
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

/// Create a job in the given status with a chosen updated_at timestamp
async fn job_in_status(
    store: &JobStore,
    section: &str,
    story: &str,
    index: i64,
    status: JobStatus,
    updated_ms: i64,
) -> JobKey {
    let new = NewJob {
        key: JobKey::section(section, "v-1"),
        parent_id: story.to_string(),
        item_index: index,
    };
    store.create(&new, 0).await.unwrap();
    if status == JobStatus::Pending {
        return new.key;
    }
    store
        .update(
            &new.key,
            JobStatus::Pending,
            JobStatus::Processing,
            &UpdateFields::default(),
            updated_ms,
        )
        .await
        .unwrap();
    if status == JobStatus::Processing {
        return new.key;
    }
    let fields = match status {
        JobStatus::Complete => UpdateFields::audio_url("/api/audio/a.wav"),
        _ => UpdateFields::error("synthesis failed"),
    };
    store
        .update(&new.key, JobStatus::Processing, status, &fields, updated_ms)
        .await
        .unwrap();
    new.key
}

#[test]
fn timeout_boundary_is_exact() {
    let (rt, store, _guard) = create_test_store();
    rt.block_on(async {
        let timeout = Duration::from_secs(300);
        let now_ms: i64 = 1_000_000;
        let cutoff = now_ms - 300_000;

        let over =
            job_in_status(&store, "sec-over", "story-1", 0, JobStatus::Processing, cutoff - 1)
                .await;
        let under =
            job_in_status(&store, "sec-under", "story-1", 1, JobStatus::Processing, cutoff + 1)
                .await;

        let found = stuck::find_stuck(&store, timeout, now_ms).await.unwrap();
        let keys: Vec<JobKey> = found.iter().map(|j| j.key()).collect();
        assert!(keys.contains(&over));
        assert!(!keys.contains(&under));
    });
}

#[test]
fn only_processing_jobs_count_as_stuck() {
    let (rt, store, _guard) = create_test_store();
    rt.block_on(async {
        // All last updated long ago; only the PROCESSING one is stuck
        job_in_status(&store, "sec-pending", "story-1", 0, JobStatus::Pending, 1_000).await;
        job_in_status(&store, "sec-complete", "story-1", 1, JobStatus::Complete, 1_000).await;
        job_in_status(&store, "sec-error", "story-1", 2, JobStatus::Error, 1_000).await;
        let processing =
            job_in_status(&store, "sec-processing", "story-1", 3, JobStatus::Processing, 1_000)
                .await;

        let found = stuck::find_stuck(&store, Duration::from_secs(300), 1_000_000)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key(), processing);
    });
}

#[test]
fn detection_is_a_pure_read() {
    let (rt, store, _guard) = create_test_store();
    rt.block_on(async {
        job_in_status(&store, "sec-1", "story-1", 0, JobStatus::Processing, 1_000).await;
        job_in_status(&store, "sec-2", "story-1", 1, JobStatus::Processing, 2_000).await;

        let first = stuck::find_stuck(&store, Duration::from_secs(300), 1_000_000)
            .await
            .unwrap();
        let second = stuck::find_stuck(&store, Duration::from_secs(300), 1_000_000)
            .await
            .unwrap();

        let first_ids: Vec<i64> = first.iter().map(|j| j.id).collect();
        let second_ids: Vec<i64> = second.iter().map(|j| j.id).collect();
        assert_eq!(first_ids, second_ids);
        assert_eq!(first.len(), 2);

        // Scanning did not touch the jobs
        for job in &second {
            assert_eq!(job.status, JobStatus::Processing);
        }
    });
}

#[test]
fn fresh_worker_updates_clear_stuckness() {
    let (rt, store, _guard) = create_test_store();
    rt.block_on(async {
        let key =
            job_in_status(&store, "sec-1", "story-1", 0, JobStatus::Processing, 999_000).await;

        let found = stuck::find_stuck(&store, Duration::from_secs(300), 1_000_000)
            .await
            .unwrap();
        assert!(found.is_empty());

        // Without further updates the same job eventually goes stale
        let found = stuck::find_stuck(&store, Duration::from_secs(300), 2_000_000)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key(), key);
    });
}

#[test]
fn stuck_scan_can_be_scoped_to_a_story() {
    let (rt, store, _guard) = create_test_store();
    rt.block_on(async {
        let mine =
            job_in_status(&store, "sec-1", "story-1", 0, JobStatus::Processing, 1_000).await;
        job_in_status(&store, "sec-2", "story-2", 0, JobStatus::Processing, 1_000).await;

        let found =
            stuck::find_stuck_under_parent(&store, "story-1", Duration::from_secs(300), 1_000_000)
                .await
                .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key(), mine);
    });
}
