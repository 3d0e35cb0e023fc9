use sea_query::{ColumnDef, Index, SqliteQueryBuilder, Table};

use crate::schema::{Jobs, Metadata, RecoveryLog};

/// CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)
pub fn create_metadata_table() -> String {
    Table::create()
        .table(Metadata::Table)
        .if_not_exists()
        .col(ColumnDef::new(Metadata::Key).string().primary_key())
        .col(ColumnDef::new(Metadata::Value).string().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS jobs (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     target_id TEXT NOT NULL,
///     voice_id TEXT,
///     parent_id TEXT NOT NULL,
///     item_index INTEGER NOT NULL,
///     status TEXT NOT NULL,
///     audio_url TEXT,
///     error TEXT,
///     created_at INTEGER NOT NULL,
///     updated_at INTEGER NOT NULL,
///     completed_at INTEGER
/// )
pub fn create_jobs_table() -> String {
    Table::create()
        .table(Jobs::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Jobs::Id)
                .integer()
                .primary_key()
                .auto_increment(),
        )
        .col(ColumnDef::new(Jobs::TargetId).string().not_null())
        .col(ColumnDef::new(Jobs::VoiceId).string())
        .col(ColumnDef::new(Jobs::ParentId).string().not_null())
        .col(ColumnDef::new(Jobs::ItemIndex).big_integer().not_null())
        .col(ColumnDef::new(Jobs::Status).string().not_null())
        .col(ColumnDef::new(Jobs::AudioUrl).string())
        .col(ColumnDef::new(Jobs::Error).string())
        .col(ColumnDef::new(Jobs::CreatedAt).big_integer().not_null())
        .col(ColumnDef::new(Jobs::UpdatedAt).big_integer().not_null())
        .col(ColumnDef::new(Jobs::CompletedAt).big_integer())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS recovery_log (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     target_id TEXT NOT NULL,
///     voice_id TEXT,
///     action TEXT NOT NULL,
///     prior_status TEXT NOT NULL,
///     new_status TEXT NOT NULL,
///     detail TEXT,
///     performed_at INTEGER NOT NULL
/// )
pub fn create_recovery_log_table() -> String {
    Table::create()
        .table(RecoveryLog::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(RecoveryLog::Id)
                .integer()
                .primary_key()
                .auto_increment(),
        )
        .col(ColumnDef::new(RecoveryLog::TargetId).string().not_null())
        .col(ColumnDef::new(RecoveryLog::VoiceId).string())
        .col(ColumnDef::new(RecoveryLog::Action).string().not_null())
        .col(ColumnDef::new(RecoveryLog::PriorStatus).string().not_null())
        .col(ColumnDef::new(RecoveryLog::NewStatus).string().not_null())
        .col(ColumnDef::new(RecoveryLog::Detail).string())
        .col(
            ColumnDef::new(RecoveryLog::PerformedAt)
                .big_integer()
                .not_null(),
        )
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_jobs_key ON jobs(target_id, voice_id, status)
pub fn create_jobs_key_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_jobs_key")
        .table(Jobs::Table)
        .col(Jobs::TargetId)
        .col(Jobs::VoiceId)
        .col(Jobs::Status)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_jobs_parent ON jobs(parent_id, item_index)
pub fn create_jobs_parent_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_jobs_parent")
        .table(Jobs::Table)
        .col(Jobs::ParentId)
        .col(Jobs::ItemIndex)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_jobs_status_updated ON jobs(status, updated_at)
pub fn create_jobs_status_updated_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_jobs_status_updated")
        .table(Jobs::Table)
        .col(Jobs::Status)
        .col(Jobs::UpdatedAt)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS idx_recovery_log_target ON recovery_log(target_id)
pub fn create_recovery_log_target_index() -> String {
    Index::create()
        .if_not_exists()
        .name("idx_recovery_log_target")
        .table(RecoveryLog::Table)
        .col(RecoveryLog::TargetId)
        .to_string(SqliteQueryBuilder)
}
