//! SQLite database module
//!
//! All reads and writes go through pools opened here; the serve command
//! uses the read-only open path so the HTTP surface can never mutate
//! job state.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;

use crate::constants::EXPECTED_DB_VERSION;
use crate::queries::{ddl, metadata};

type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Open a file-based database pool for production use
/// Enables WAL mode and foreign keys, creating the file if needed
pub async fn open_database(db_path: &Path) -> Result<SqlitePool, DynError> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Open a read-only database pool (for web server handlers)
/// Uses explicit read-only mode for safety
pub async fn open_readonly_database(db_path: &Path) -> Result<SqlitePool, DynError> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .read_only(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Initialize database schema
/// Creates tables and indexes, then stamps or validates the schema version
pub async fn init_database_schema(pool: &SqlitePool) -> Result<(), DynError> {
    for sql in [
        ddl::create_metadata_table(),
        ddl::create_jobs_table(),
        ddl::create_recovery_log_table(),
        ddl::create_jobs_key_index(),
        ddl::create_jobs_parent_index(),
        ddl::create_jobs_status_updated_index(),
        ddl::create_recovery_log_target_index(),
    ] {
        sqlx::query(&sql).execute(pool).await?;
    }

    match query_metadata(pool, "version").await? {
        Some(version) if version == EXPECTED_DB_VERSION => {}
        Some(version) => {
            return Err(format!(
                "Unsupported database version: '{}'. This application only supports version '{}'",
                version, EXPECTED_DB_VERSION
            )
            .into());
        }
        None => {
            let sql = metadata::insert("version", EXPECTED_DB_VERSION);
            sqlx::query(&sql).execute(pool).await?;
        }
    }

    Ok(())
}

/// Query a single metadata value by key
pub async fn query_metadata(pool: &SqlitePool, key: &str) -> Result<Option<String>, DynError> {
    let sql = metadata::select_by_key(key);
    let result = sqlx::query(&sql).fetch_optional(pool).await?;
    Ok(result.map(|row| row.get::<String, _>(0)))
}

/// Create a temp-file database with schema for testing
/// Returns (pool, guard) - keep the guard alive to prevent temp file deletion
pub async fn create_test_connection_in_temporary_file(
) -> Result<(SqlitePool, tempfile::TempDir), DynError> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("test.sqlite");
    let pool = open_database(&db_path).await?;
    Ok((pool, dir))
}
