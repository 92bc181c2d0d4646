//! Shotwatch Index - Local record persistence
//!
//! SQLite-based record index for:
//! - File records (one per uploaded object still present remotely)
//! - Permission grants issued on the root folder
//!
//! ## Architecture
//!
//! This crate implements the `IRecordIndex` port from `shotwatch-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteRecordIndex`] - `IRecordIndex` implementation handing out
//!   transaction-scoped [`SqliteIndexTransaction`]s
//! - [`IndexError`] - Error types for index operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use shotwatch_index::{DatabasePool, SqliteRecordIndex};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/shotwatch/index.db")).await?;
//! let index = SqliteRecordIndex::new(pool.pool().clone());
//! // Use index as IRecordIndex...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::{SqliteIndexTransaction, SqliteRecordIndex};

/// Errors that can occur during index operations
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A set-membership lookup was given no ids
    #[error("Permission id set must not be empty")]
    EmptyIdSet,

    /// A stored row could not be mapped back to a domain type
    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

impl From<sqlx::Error> for IndexError {
    fn from(e: sqlx::Error) -> Self {
        IndexError::QueryFailed(e.to_string())
    }
}
