//! Read-only HTTP status surface
//!
//! Serves the aggregated story status and stuck-job listings for
//! dashboards and manual inspection. Every handler queries the store
//! directly; an ERROR job is always reported as ERROR, never folded
//! into a generic unknown.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use log::{error, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::config::TrackerConfig;
use crate::constants::EXPECTED_DB_VERSION;
use crate::recover;
use crate::store::{JobKey, JobStore, StoreError};
use crate::stuck;

// State for status API handlers
pub struct AppState {
    pub store: JobStore,
    pub stuck_timeout: Duration,
}

/// Serve read-only status endpoints for a job database
pub fn serve_status(config: &TrackerConfig, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    if !config.db_path.exists() {
        return Err(format!("Database file not found: {}", config.db_path.display()).into());
    }

    println!("Starting status server for: {}", config.db_path.display());
    println!("Stuck timeout: {}s", config.stuck_timeout_secs);
    println!("Listening on: http://[::]:{} (IPv4 + IPv6)", port);
    println!("Endpoints:");
    println!("  GET /api/stories/{{story_id}}/status  - aggregated per-section status");
    println!("  GET /api/stories/{{story_id}}/jobs  - full job history for a story");
    println!("  GET /api/jobs/stuck?timeout_secs=<N>  - jobs stalled in PROCESSING");
    println!("  GET /api/jobs/{{target_id}}?voice_id=<id>  - latest job for a key");
    println!("  GET /api/jobs/{{target_id}}/recovery  - applied overrides for a target");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let pool = crate::db::open_readonly_database(&config.db_path)
            .await
            .map_err(|e| format!("Failed to open database: {}", e))?;

        // Check version first
        let db_version = crate::db::query_metadata(&pool, "version")
            .await
            .map_err(|e| format!("Failed to read version from metadata: {}", e))?
            .ok_or("Database is missing version in metadata")?;

        if db_version != EXPECTED_DB_VERSION {
            return Err(format!(
                "Unsupported database version: '{}'. This application only supports version '{}'",
                db_version, EXPECTED_DB_VERSION
            )
            .into());
        }

        let stuck_timeout = config.stuck_timeout();
        spawn_stuck_scan(
            JobStore::new(pool.clone()),
            stuck_timeout,
            Duration::from_secs(config.scan_interval_secs),
        );

        let app_state = Arc::new(AppState {
            store: JobStore::new(pool),
            stuck_timeout,
        });

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .route("/api/stories/{story_id}/status", get(story_status_handler))
            .route("/api/stories/{story_id}/jobs", get(story_jobs_handler))
            .route("/api/jobs/stuck", get(stuck_jobs_handler))
            .route("/api/jobs/{target_id}", get(job_handler))
            .route("/api/jobs/{target_id}/recovery", get(recovery_log_handler))
            .layer(cors)
            .with_state(app_state);

        let listener = tokio::net::TcpListener::bind(format!("[::]:{}", port))
            .await
            .map_err(|e| format!("Failed to bind to port {}: {}", port, e))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| format!("Server error: {}", e))?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Periodic stuck-job scan: surfaces candidates in the log, never
/// remedies them. The remedy stays an explicit operator decision.
fn spawn_stuck_scan(store: JobStore, timeout: Duration, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it so startup stays quiet
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let now_ms = Utc::now().timestamp_millis();
            match stuck::find_stuck(&store, timeout, now_ms).await {
                Ok(jobs) if jobs.is_empty() => {}
                Ok(jobs) => {
                    warn!(
                        "{} job(s) stuck in PROCESSING past {}s",
                        jobs.len(),
                        timeout.as_secs()
                    );
                    for job in &jobs {
                        warn!(
                            "  stuck job {}: last update {}s ago",
                            job.key(),
                            (now_ms - job.updated_at) / 1000
                        );
                    }
                }
                Err(e) => error!("Stuck-job scan failed: {}", e),
            }
        }
    });
}

async fn story_status_handler(
    State(state): State<Arc<AppState>>,
    Path(story_id): Path<String>,
) -> impl IntoResponse {
    match state.store.status_by_parent(&story_id).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => {
            error!("Status query failed for story {}: {}", story_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": format!("Query error: {}", e)})),
            )
                .into_response()
        }
    }
}

async fn story_jobs_handler(
    State(state): State<Arc<AppState>>,
    Path(story_id): Path<String>,
) -> impl IntoResponse {
    match state.store.list_by_parent(&story_id).await {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => {
            error!("Job listing failed for story {}: {}", story_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": format!("Query error: {}", e)})),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
struct StuckParams {
    timeout_secs: Option<u64>,
}

async fn stuck_jobs_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StuckParams>,
) -> impl IntoResponse {
    let timeout = params
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(state.stuck_timeout);
    let now_ms = Utc::now().timestamp_millis();
    match stuck::find_stuck(&state.store, timeout, now_ms).await {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => {
            error!("Stuck-job query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": format!("Query error: {}", e)})),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
struct JobParams {
    voice_id: Option<String>,
}

async fn recovery_log_handler(
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<String>,
) -> impl IntoResponse {
    match recover::log_for_target(&state.store, &target_id).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            error!("Recovery-log query failed for {}: {}", target_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": format!("Query error: {}", e)})),
            )
                .into_response()
        }
    }
}

async fn job_handler(
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<String>,
    Query(params): Query<JobParams>,
) -> impl IntoResponse {
    let key = JobKey {
        target_id,
        voice_id: params.voice_id,
    };
    match state.store.get_by_key(&key).await {
        Ok(job) => Json(job).into_response(),
        Err(StoreError::NotFound(key)) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("No job found for key {}", key)})),
        )
            .into_response(),
        Err(e) => {
            error!("Job lookup failed for {}: {}", key, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": format!("Query error: {}", e)})),
            )
                .into_response()
        }
    }
}
