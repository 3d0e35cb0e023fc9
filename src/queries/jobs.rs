use sea_query::{Expr, ExprTrait, Order, Query, SimpleExpr, SqliteQueryBuilder};

use crate::schema::Jobs;
use crate::status::JobStatus;

/// Columns selected for a full job row, in `Job::from_row` order
fn job_columns() -> [Jobs; 11] {
    [
        Jobs::Id,
        Jobs::TargetId,
        Jobs::VoiceId,
        Jobs::ParentId,
        Jobs::ItemIndex,
        Jobs::Status,
        Jobs::AudioUrl,
        Jobs::Error,
        Jobs::CreatedAt,
        Jobs::UpdatedAt,
        Jobs::CompletedAt,
    ]
}

/// WHERE voice_id = ? (or IS NULL for narration-chunk jobs)
fn voice_predicate(voice_id: Option<&str>) -> SimpleExpr {
    match voice_id {
        Some(v) => Expr::col(Jobs::VoiceId).eq(v),
        None => Expr::col(Jobs::VoiceId).is_null(),
    }
}

/// INSERT INTO jobs (...) SELECT ?, ?, ?, ?, 'PENDING', ?, ?
/// WHERE NOT EXISTS (SELECT id FROM jobs WHERE <key> AND status IN ('PENDING', 'PROCESSING'))
///
/// Single-statement duplicate guard: affects zero rows when an
/// unfinished job already exists for the key.
pub fn insert_if_no_active(
    target_id: &str,
    voice_id: Option<&str>,
    parent_id: &str,
    item_index: i64,
    now_ms: i64,
) -> String {
    let mut active = Query::select();
    active
        .column(Jobs::Id)
        .from(Jobs::Table)
        .and_where(Expr::col(Jobs::TargetId).eq(target_id))
        .and_where(voice_predicate(voice_id))
        .and_where(Expr::col(Jobs::Status).is_in([
            JobStatus::Pending.as_str(),
            JobStatus::Processing.as_str(),
        ]));

    let mut values = Query::select();
    values
        .expr(Expr::val(target_id))
        .expr(Expr::val(voice_id.map(str::to_owned)))
        .expr(Expr::val(parent_id))
        .expr(Expr::val(item_index))
        .expr(Expr::val(JobStatus::Pending.as_str()))
        .expr(Expr::val(now_ms))
        .expr(Expr::val(now_ms))
        .and_where(Expr::exists(active).not());

    Query::insert()
        .into_table(Jobs::Table)
        .columns([
            Jobs::TargetId,
            Jobs::VoiceId,
            Jobs::ParentId,
            Jobs::ItemIndex,
            Jobs::Status,
            Jobs::CreatedAt,
            Jobs::UpdatedAt,
        ])
        .select_from(values)
        .expect("insert column list matches select expressions")
        .to_string(SqliteQueryBuilder)
}

/// SELECT <job columns> FROM jobs WHERE <key> ORDER BY id DESC LIMIT 1
///
/// The latest row for a key: the active job if one exists, otherwise
/// the most recent terminal record.
pub fn select_latest_by_key(target_id: &str, voice_id: Option<&str>) -> String {
    Query::select()
        .columns(job_columns())
        .from(Jobs::Table)
        .and_where(Expr::col(Jobs::TargetId).eq(target_id))
        .and_where(voice_predicate(voice_id))
        .order_by(Jobs::Id, Order::Desc)
        .limit(1)
        .to_string(SqliteQueryBuilder)
}

/// SELECT <job columns> FROM jobs WHERE parent_id = ? ORDER BY item_index, id
pub fn select_by_parent(parent_id: &str) -> String {
    Query::select()
        .columns(job_columns())
        .from(Jobs::Table)
        .and_where(Expr::col(Jobs::ParentId).eq(parent_id))
        .order_by(Jobs::ItemIndex, Order::Asc)
        .order_by(Jobs::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// UPDATE jobs SET status = ?, updated_at = ? [, audio_url = ?] [, error = ?]
/// [, completed_at = ?] WHERE <key> AND status = ?
///
/// The conditional write behind every status transition: status, fields
/// and timestamps commit together or not at all, and the `status = ?`
/// guard makes the statement a no-op when the stored status has moved on.
pub fn guarded_update(
    target_id: &str,
    voice_id: Option<&str>,
    expected: JobStatus,
    new_status: JobStatus,
    audio_url: Option<&str>,
    error: Option<&str>,
    now_ms: i64,
) -> String {
    let mut stmt = Query::update();
    stmt.table(Jobs::Table)
        .value(Jobs::Status, new_status.as_str())
        .value(Jobs::UpdatedAt, now_ms);
    if let Some(url) = audio_url {
        stmt.value(Jobs::AudioUrl, url);
    }
    if let Some(reason) = error {
        stmt.value(Jobs::Error, reason);
    }
    if new_status.is_terminal() {
        stmt.value(Jobs::CompletedAt, now_ms);
    }
    stmt.and_where(Expr::col(Jobs::TargetId).eq(target_id))
        .and_where(voice_predicate(voice_id))
        .and_where(Expr::col(Jobs::Status).eq(expected.as_str()))
        .to_string(SqliteQueryBuilder)
}

/// SELECT <job columns> FROM jobs WHERE status = 'PROCESSING' AND updated_at <= ?
/// ORDER BY updated_at
pub fn select_processing_before(cutoff_ms: i64) -> String {
    Query::select()
        .columns(job_columns())
        .from(Jobs::Table)
        .and_where(Expr::col(Jobs::Status).eq(JobStatus::Processing.as_str()))
        .and_where(Expr::col(Jobs::UpdatedAt).lte(cutoff_ms))
        .order_by(Jobs::UpdatedAt, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// Same as select_processing_before, restricted to one parent
pub fn select_processing_before_under_parent(parent_id: &str, cutoff_ms: i64) -> String {
    Query::select()
        .columns(job_columns())
        .from(Jobs::Table)
        .and_where(Expr::col(Jobs::ParentId).eq(parent_id))
        .and_where(Expr::col(Jobs::Status).eq(JobStatus::Processing.as_str()))
        .and_where(Expr::col(Jobs::UpdatedAt).lte(cutoff_ms))
        .order_by(Jobs::UpdatedAt, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT item_index, status, updated_at, error FROM jobs
/// WHERE parent_id = ? AND id IN (latest row per item_index)
/// ORDER BY item_index
pub fn select_status_by_parent(parent_id: &str) -> String {
    let mut latest = Query::select();
    latest
        .expr(Expr::col(Jobs::Id).max())
        .from(Jobs::Table)
        .and_where(Expr::col(Jobs::ParentId).eq(parent_id))
        .group_by_col(Jobs::ItemIndex);

    Query::select()
        .columns([Jobs::ItemIndex, Jobs::Status, Jobs::UpdatedAt, Jobs::Error])
        .from(Jobs::Table)
        .and_where(Expr::col(Jobs::Id).in_subquery(latest))
        .order_by(Jobs::ItemIndex, Order::Asc)
        .to_string(SqliteQueryBuilder)
}
