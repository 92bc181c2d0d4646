//! Per-event reconciliation
//!
//! The [`ReconciliationEngine`] turns one [`WatchEvent`] into an ordered
//! sequence of remote store and record index mutations:
//!
//! - **Write**: resolve the daily folder, upload, then index the object.
//! - **Remove**: look up the record, delete remotely, then drop the record
//!   in the same transaction.
//!
//! An index row is never committed before the matching remote mutation
//! succeeded. Every failure is reported as an [`EventOutcome`] rather than
//! propagated, so one bad event never stops the loop.

use std::path::Path;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use shotwatch_core::config::DriveConfig;
use shotwatch_core::domain::{FileRecord, RemoteId, WatchedDirectory};
use shotwatch_core::ports::{IRecordIndex, IRemoteStore, RemoteStoreError};
use tracing::{debug, error, info, warn};

use crate::watcher::{WatchEvent, WatchOp};

/// Length of the random suffix on newly created daily folders
const DAILY_SUFFIX_LEN: usize = 5;

// ============================================================================
// EventOutcome
// ============================================================================

/// How reconciliation of a single event ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Uploaded and indexed
    Uploaded { name: String, remote_id: RemoteId },
    /// Deleted remotely and removed from the index
    Deleted { name: String, remote_id: RemoteId },
    /// Remove event for a file the index has no record of
    NotIndexed { name: String },
    /// Event kind that needs no reconciliation
    Ignored,
    /// Event path is not a file directly under the watched directory
    PathRejected,
    /// A remote store call failed; the index is untouched
    RemoteFailed { name: String },
    /// The indexed id turned out to be a folder and was not deleted
    RefusedContainer { name: String, remote_id: RemoteId },
    /// The index could not be read or written
    ///
    /// `remote_id` is set when the remote mutation had already succeeded,
    /// i.e. remote and index now disagree about that object.
    IndexFailed {
        name: String,
        remote_id: Option<RemoteId>,
    },
    /// The handler exceeded its deadline and was abandoned
    TimedOut,
}

impl EventOutcome {
    /// Whether the event left its work undone
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::PathRejected
                | Self::RemoteFailed { .. }
                | Self::RefusedContainer { .. }
                | Self::IndexFailed { .. }
                | Self::TimedOut
        )
    }
}

// ============================================================================
// EngineSettings
// ============================================================================

/// Naming and upload parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Daily folders are named `<prefix>YYYY-MM-DD`
    pub daily_prefix: String,
    /// Content type sent with every upload
    pub mime_type: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            daily_prefix: "SS_".to_string(),
            mime_type: "image/png".to_string(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(drive: &DriveConfig) -> Self {
        Self {
            daily_prefix: drive.daily_folder_prefix.clone(),
            mime_type: drive.upload_mime_type.clone(),
        }
    }
}

/// Name searched for when resolving the folder of `date`
pub fn daily_bucket_name(prefix: &str, date: NaiveDate) -> String {
    format!("{}{}", prefix, date.format("%Y-%m-%d"))
}

fn random_suffix() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(DAILY_SUFFIX_LEN)
        .collect()
}

// ============================================================================
// ReconciliationEngine
// ============================================================================

/// Holds the injected stores and applies events to them one at a time
pub struct ReconciliationEngine {
    remote: Arc<dyn IRemoteStore>,
    index: Arc<dyn IRecordIndex>,
    watched: WatchedDirectory,
    root_id: RemoteId,
    settings: EngineSettings,
}

impl ReconciliationEngine {
    pub fn new(
        remote: Arc<dyn IRemoteStore>,
        index: Arc<dyn IRecordIndex>,
        watched: WatchedDirectory,
        root_id: RemoteId,
        settings: EngineSettings,
    ) -> Self {
        Self {
            remote,
            index,
            watched,
            root_id,
            settings,
        }
    }

    pub fn root_id(&self) -> &RemoteId {
        &self.root_id
    }

    pub fn watched(&self) -> &WatchedDirectory {
        &self.watched
    }

    /// Routes an event to its handler
    #[tracing::instrument(skip(self, event), fields(path = %event.path.display(), op = ?event.op))]
    pub async fn handle(&self, event: &WatchEvent) -> EventOutcome {
        match event.op {
            WatchOp::Write => self.handle_write(&event.path).await,
            WatchOp::Remove => self.handle_remove(&event.path).await,
            WatchOp::Other => {
                debug!("Ignoring event");
                EventOutcome::Ignored
            }
        }
    }

    /// Uploads `path` into today's folder and indexes the new object
    pub async fn handle_write(&self, path: &Path) -> EventOutcome {
        let Some(name) = self.file_name(path) else {
            return EventOutcome::PathRejected;
        };

        let today = Local::now().date_naive();
        let bucket = match self.resolve_daily_bucket(today).await {
            Ok(bucket) => bucket,
            Err(e) => {
                warn!(file = %name, error = %format!("{e:#}"), "Could not resolve daily folder");
                return EventOutcome::RemoteFailed { name };
            }
        };

        let remote_id = match self
            .remote
            .upload_object(&name, path, &self.settings.mime_type, &bucket)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(file = %name, error = %format!("{e:#}"), "Upload failed, event dropped");
                return EventOutcome::RemoteFailed { name };
            }
        };

        let record = FileRecord::new(remote_id.clone(), name.clone(), bucket);
        match self.index_upload(&record).await {
            Ok(()) => {
                info!(file = %name, remote_id = %remote_id, "Uploaded");
                EventOutcome::Uploaded { name, remote_id }
            }
            Err(e) => {
                error!(
                    file = %name,
                    remote_id = %remote_id,
                    error = %format!("{e:#}"),
                    "Uploaded but not indexed; remote object has no index row"
                );
                EventOutcome::IndexFailed {
                    name,
                    remote_id: Some(remote_id),
                }
            }
        }
    }

    /// Deletes the object indexed under the file name of `path`
    ///
    /// Only the oldest record for that name is reconciled. A file that was
    /// uploaded several times keeps its newer remote copies and their rows.
    pub async fn handle_remove(&self, path: &Path) -> EventOutcome {
        let Some(name) = self.file_name(path) else {
            return EventOutcome::PathRejected;
        };

        let mut tx = match self.index.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(file = %name, error = %format!("{e:#}"), "Could not open index transaction");
                return EventOutcome::IndexFailed {
                    name,
                    remote_id: None,
                };
            }
        };

        let record = match tx.find_file_by_name(&name).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(file = %name, "No record for removed file, nothing to delete");
                return EventOutcome::NotIndexed { name };
            }
            Err(e) => {
                error!(file = %name, error = %format!("{e:#}"), "Record lookup failed");
                return EventOutcome::IndexFailed {
                    name,
                    remote_id: None,
                };
            }
        };
        let remote_id = record.remote_id;

        if let Err(e) = self.remote.delete_object(&remote_id).await {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %format!("{rollback:#}"), "Rollback failed");
            }

            if let Some(RemoteStoreError::IsContainer(_)) = e.downcast_ref::<RemoteStoreError>() {
                error!(file = %name, remote_id = %remote_id, "Indexed id is a folder; refusing to delete it");
                return EventOutcome::RefusedContainer { name, remote_id };
            }
            warn!(
                file = %name,
                remote_id = %remote_id,
                error = %format!("{e:#}"),
                "Remote delete failed; record kept"
            );
            return EventOutcome::RemoteFailed { name };
        }

        let unindexed = match tx.delete_file_by_remote_id(&remote_id).await {
            Ok(_) => tx.commit().await,
            Err(e) => Err(e),
        };
        if let Err(e) = unindexed {
            error!(
                file = %name,
                remote_id = %remote_id,
                error = %format!("{e:#}"),
                "Deleted remotely but record is still indexed"
            );
            return EventOutcome::IndexFailed {
                name,
                remote_id: Some(remote_id),
            };
        }

        info!(file = %name, remote_id = %remote_id, "Deleted");
        EventOutcome::Deleted { name, remote_id }
    }

    /// Finds the folder for `date` under the root, creating it when absent
    ///
    /// A created folder gets a random suffix. Later lookups still find it
    /// since the search is a `contains` match.
    pub async fn resolve_daily_bucket(&self, date: NaiveDate) -> anyhow::Result<RemoteId> {
        let base = daily_bucket_name(&self.settings.daily_prefix, date);

        if let Some(id) = self
            .remote
            .find_container(&base, Some(&self.root_id))
            .await?
        {
            debug!(folder = %base, id = %id, "Using existing daily folder");
            return Ok(id);
        }

        let name = format!("{}_{}", base, random_suffix());
        let id = self
            .remote
            .create_container(&name, Some(&self.root_id))
            .await?;
        info!(folder = %name, id = %id, "Created daily folder");
        Ok(id)
    }

    async fn index_upload(&self, record: &FileRecord) -> anyhow::Result<()> {
        let mut tx = self.index.begin().await?;
        tx.insert_file(record).await?;
        tx.commit().await
    }

    fn file_name(&self, path: &Path) -> Option<String> {
        match self.watched.relative_name(path) {
            Ok(name) => Some(name),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Event path rejected");
                None
            }
        }
    }
}
