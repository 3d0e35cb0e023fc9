use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use crate::schema::RecoveryLog;

/// INSERT INTO recovery_log (target_id, voice_id, action, prior_status,
/// new_status, detail, performed_at) VALUES (...)
pub fn insert(
    target_id: &str,
    voice_id: Option<&str>,
    action: &str,
    prior_status: &str,
    new_status: &str,
    detail: Option<&str>,
    performed_at: i64,
) -> String {
    Query::insert()
        .into_table(RecoveryLog::Table)
        .columns([
            RecoveryLog::TargetId,
            RecoveryLog::VoiceId,
            RecoveryLog::Action,
            RecoveryLog::PriorStatus,
            RecoveryLog::NewStatus,
            RecoveryLog::Detail,
            RecoveryLog::PerformedAt,
        ])
        .values_panic([
            target_id.into(),
            voice_id.map(str::to_owned).into(),
            action.into(),
            prior_status.into(),
            new_status.into(),
            detail.map(str::to_owned).into(),
            performed_at.into(),
        ])
        .to_string(SqliteQueryBuilder)
}

/// SELECT action, prior_status, new_status, detail, performed_at
/// FROM recovery_log WHERE target_id = ? ORDER BY id
pub fn select_by_target(target_id: &str) -> String {
    Query::select()
        .columns([
            RecoveryLog::Action,
            RecoveryLog::PriorStatus,
            RecoveryLog::NewStatus,
            RecoveryLog::Detail,
            RecoveryLog::PerformedAt,
        ])
        .from(RecoveryLog::Table)
        .and_where(Expr::col(RecoveryLog::TargetId).eq(target_id))
        .order_by(RecoveryLog::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}
