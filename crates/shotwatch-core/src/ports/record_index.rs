//! Record index port (driven/secondary port)
//!
//! This module defines the interface to the local relational store holding
//! [`FileRecord`] and [`PermissionGrant`] rows.
//!
//! ## Design Notes
//!
//! - Every read and write goes through an [`IIndexTransaction`]. The engine
//!   opens one per logical operation and never nests them.
//! - `commit`/`rollback` consume the boxed transaction. Dropping it without
//!   either discards all statements, same as a rollback.
//! - Uses `anyhow::Result` because storage errors are adapter-specific.

use crate::domain::{newtypes::PermissionId, FileRecord, PermissionGrant, RemoteId};

/// Port trait for opening index transactions
#[async_trait::async_trait]
pub trait IRecordIndex: Send + Sync {
    /// Begin a new transaction
    async fn begin(&self) -> anyhow::Result<Box<dyn IIndexTransaction>>;
}

/// A single open index transaction
#[async_trait::async_trait]
pub trait IIndexTransaction: Send {
    // ========================================================================
    // File records
    // ========================================================================

    /// Find the file record for a watched filename
    async fn find_file_by_name(&mut self, name: &str) -> anyhow::Result<Option<FileRecord>>;

    /// Insert a file record and return it with its assigned row id
    async fn insert_file(&mut self, record: &FileRecord) -> anyhow::Result<FileRecord>;

    /// Delete the file record for a remote object, returning the rows removed
    async fn delete_file_by_remote_id(&mut self, remote_id: &RemoteId) -> anyhow::Result<u64>;

    /// List all live file records, oldest first
    async fn list_files(&mut self) -> anyhow::Result<Vec<FileRecord>>;

    // ========================================================================
    // Permission grants
    // ========================================================================

    /// Find grants whose permission id is in `ids`
    ///
    /// # Errors
    /// Fails if `ids` is empty
    async fn find_grants_by_permission_ids(
        &mut self,
        ids: &[PermissionId],
    ) -> anyhow::Result<Vec<PermissionGrant>>;

    /// Insert a grant and return it with its assigned row id
    async fn insert_grant(&mut self, grant: &PermissionGrant) -> anyhow::Result<PermissionGrant>;

    /// Delete the grant for a permission id, returning the rows removed
    async fn delete_grant_by_permission_id(&mut self, id: &PermissionId) -> anyhow::Result<u64>;

    // ========================================================================
    // Completion
    // ========================================================================

    async fn commit(self: Box<Self>) -> anyhow::Result<()>;

    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}
