//! SQLite implementation of IRecordIndex
//!
//! This module provides the concrete SQLite-based implementation of the
//! record index port defined in shotwatch-core. Every operation runs inside a
//! [`SqliteIndexTransaction`] wrapping a single `sqlx::Transaction`.
//!
//! ## Type Mapping
//!
//! | Domain Type   | SQL Type | Strategy                                    |
//! |---------------|----------|---------------------------------------------|
//! | RecordId      | INTEGER  | `as_i64()` / `RecordId::new()`              |
//! | RemoteId      | TEXT     | `as_str()` / `RemoteId::new()`              |
//! | PermissionId  | TEXT     | `as_str()` / `PermissionId::new()`          |
//! | Email         | TEXT     | lowercased `as_str()` / `Email::new()`      |
//! | DateTime<Utc> | TEXT     | ISO 8601 via `to_rfc3339()`                 |

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};

use shotwatch_core::domain::{
    newtypes::{Email, PermissionId, RecordId, RemoteId},
    FileRecord, PermissionGrant,
};
use shotwatch_core::ports::{IIndexTransaction, IRecordIndex};

use crate::IndexError;

/// SQLite-backed record index
///
/// Cheap to clone: the pool is reference counted.
#[derive(Clone)]
pub struct SqliteRecordIndex {
    pool: SqlitePool,
}

impl SqliteRecordIndex {
    /// Creates a new index over the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl IRecordIndex for SqliteRecordIndex {
    async fn begin(&self) -> anyhow::Result<Box<dyn IIndexTransaction>> {
        let tx = self.pool.begin().await.map_err(IndexError::from)?;
        tracing::trace!("Index transaction started");
        Ok(Box::new(SqliteIndexTransaction { tx }))
    }
}

/// One open transaction on the record index
///
/// Dropping it without calling `commit` rolls every statement back.
pub struct SqliteIndexTransaction {
    tx: Transaction<'static, Sqlite>,
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, IndexError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Rows written by hand through the sqlite3 shell
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| IndexError::InvalidRow(format!("Failed to parse datetime '{}': {}", s, e)))
}

fn row_to_file_record(row: &SqliteRow) -> Result<FileRecord, IndexError> {
    let id: i64 = row.try_get("id")?;
    let remote_id: String = row.try_get("remote_object_id")?;
    let name: String = row.try_get("name")?;
    let container_id: String = row.try_get("container_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(FileRecord {
        id: Some(RecordId::new(id)),
        remote_id: RemoteId::new(remote_id).map_err(|e| IndexError::InvalidRow(e.to_string()))?,
        name,
        container_id: RemoteId::new(container_id)
            .map_err(|e| IndexError::InvalidRow(e.to_string()))?,
        created_at: parse_datetime(&created_at)?,
    })
}

fn row_to_grant(row: &SqliteRow) -> Result<PermissionGrant, IndexError> {
    let id: i64 = row.try_get("id")?;
    let permission_id: String = row.try_get("permission_id")?;
    let email: String = row.try_get("email")?;

    Ok(PermissionGrant {
        id: Some(RecordId::new(id)),
        permission_id: PermissionId::new(permission_id)
            .map_err(|e| IndexError::InvalidRow(e.to_string()))?,
        email: Email::new(email).map_err(|e| IndexError::InvalidRow(e.to_string()))?,
    })
}

// ============================================================================
// IIndexTransaction implementation
// ============================================================================

#[async_trait::async_trait]
impl IIndexTransaction for SqliteIndexTransaction {
    // --- File records ---

    async fn find_file_by_name(&mut self, name: &str) -> anyhow::Result<Option<FileRecord>> {
        // Repeated writes of one filename leave several rows; the oldest wins
        let row = sqlx::query(
            "SELECT id, remote_object_id, name, container_id, created_at \
             FROM file_records WHERE name = ? ORDER BY id ASC LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(IndexError::from)?;

        Ok(row.as_ref().map(row_to_file_record).transpose()?)
    }

    async fn insert_file(&mut self, record: &FileRecord) -> anyhow::Result<FileRecord> {
        let result = sqlx::query(
            "INSERT INTO file_records (remote_object_id, name, container_id, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(record.remote_id.as_str())
        .bind(&record.name)
        .bind(record.container_id.as_str())
        .bind(record.created_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .map_err(IndexError::from)?;

        let id = RecordId::new(result.last_insert_rowid());
        tracing::trace!(record_id = %id, remote_id = %record.remote_id, "Inserted file record");
        Ok(record.clone().with_id(id))
    }

    async fn delete_file_by_remote_id(&mut self, remote_id: &RemoteId) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM file_records WHERE remote_object_id = ?")
            .bind(remote_id.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(IndexError::from)?;

        tracing::trace!(remote_id = %remote_id, rows = result.rows_affected(), "Deleted file record");
        Ok(result.rows_affected())
    }

    async fn list_files(&mut self) -> anyhow::Result<Vec<FileRecord>> {
        let rows = sqlx::query(
            "SELECT id, remote_object_id, name, container_id, created_at \
             FROM file_records ORDER BY id ASC",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(IndexError::from)?;

        let records = rows
            .iter()
            .map(row_to_file_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    // --- Permission grants ---

    async fn find_grants_by_permission_ids(
        &mut self,
        ids: &[PermissionId],
    ) -> anyhow::Result<Vec<PermissionGrant>> {
        if ids.is_empty() {
            return Err(IndexError::EmptyIdSet.into());
        }

        // Ids come from the remote access list, so they are bound, never spliced
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT id, permission_id, email FROM permission_grants WHERE permission_id IN (",
        );
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str().to_string());
        }
        separated.push_unseparated(") ORDER BY id ASC");

        let rows = builder
            .build()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(IndexError::from)?;

        let grants = rows
            .iter()
            .map(row_to_grant)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::trace!(requested = ids.len(), found = grants.len(), "Looked up grants");
        Ok(grants)
    }

    async fn insert_grant(&mut self, grant: &PermissionGrant) -> anyhow::Result<PermissionGrant> {
        let result = sqlx::query("INSERT INTO permission_grants (permission_id, email) VALUES (?, ?)")
            .bind(grant.permission_id.as_str())
            .bind(grant.email.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(IndexError::from)?;

        let id = RecordId::new(result.last_insert_rowid());
        tracing::trace!(record_id = %id, permission_id = %grant.permission_id, "Inserted grant");
        Ok(grant.clone().with_id(id))
    }

    async fn delete_grant_by_permission_id(&mut self, id: &PermissionId) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM permission_grants WHERE permission_id = ?")
            .bind(id.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(IndexError::from)?;

        Ok(result.rows_affected())
    }

    // --- Completion ---

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let this = *self;
        this.tx.commit().await.map_err(IndexError::from)?;
        tracing::trace!("Index transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        let this = *self;
        this.tx.rollback().await.map_err(IndexError::from)?;
        tracing::trace!("Index transaction rolled back");
        Ok(())
    }
}
