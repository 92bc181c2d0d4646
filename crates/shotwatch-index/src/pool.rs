//! Database connection pool management
//!
//! Wraps SQLx's SqlitePool with:
//! - Automatic directory creation for the index file
//! - WAL journal mode so readers never block the writer
//! - Schema migration on open
//! - In-memory mode for testing

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::IndexError;

/// Seconds a writer waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool of SQLite connections backing the record index
///
/// File-backed pools hold up to 5 connections; in-memory pools hold exactly
/// one, since every SQLite in-memory connection is a separate database.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the index database at `db_path`
    ///
    /// Parent directories are created, WAL mode is enabled and the schema
    /// migration is applied before the pool is returned.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::ConnectionFailed` if the file cannot be opened,
    /// or `IndexError::MigrationFailed` if the schema cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                IndexError::ConnectionFailed(format!(
                    "Failed to create index directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                IndexError::ConnectionFailed(format!(
                    "Failed to open record index at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::info!(path = %db_path.display(), "Record index opened");

        Ok(Self { pool })
    }

    /// Creates an in-memory index for testing
    ///
    /// # Errors
    ///
    /// Returns `IndexError::ConnectionFailed` or `IndexError::MigrationFailed`.
    pub async fn in_memory() -> Result<Self, IndexError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                IndexError::ConnectionFailed(format!("Failed to create in-memory index: {}", e))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::debug!("In-memory record index initialized");

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Waits for checked-out connections to return and closes the pool
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("Record index closed");
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), IndexError> {
        let migration_sql = include_str!("migrations/20261016_initial.sql");
        sqlx::raw_sql(migration_sql)
            .execute(pool)
            .await
            .map_err(|e| {
                IndexError::MigrationFailed(format!("Failed to apply index schema: {}", e))
            })?;

        tracing::debug!("Record index schema applied");
        Ok(())
    }
}
