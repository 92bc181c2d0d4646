//! Startup reconciliation of the root folder and its access grants
//!
//! Runs once before the event loop. Every piece of missing state costs at
//! most one remote mutation, and a second run against the same state makes
//! none. Index writes happen in a single transaction that is committed only
//! after all remote calls of the pass have succeeded.

use std::collections::HashSet;

use shotwatch_core::domain::{Email, PermissionGrant, PermissionId, RemoteId};
use shotwatch_core::ports::{AccessRole, IIndexTransaction, IRecordIndex, IRemoteStore};
use thiserror::Error;
use tracing::{error, info, warn};

/// Outcome of a successful bootstrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Id of the root folder uploads go under
    pub root_id: RemoteId,
    /// The root folder did not exist and was created by this pass
    pub created_container: bool,
    /// A new grant was issued to the operator
    pub granted: bool,
}

/// Reasons bootstrap aborts; all of them are fatal for startup
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Looking up, creating or listing on the remote store failed
    #[error("Remote store call failed during bootstrap: {0}")]
    RemoteFailed(#[source] anyhow::Error),

    /// Granting the operator access failed
    ///
    /// `compensated` tells whether a root folder created by this pass was
    /// removed again.
    #[error("Granting operator access failed (created folder removed: {compensated}): {source}")]
    GrantFailed {
        #[source]
        source: anyhow::Error,
        compensated: bool,
    },

    /// The record index could not be read or written
    #[error("Record index failed during bootstrap: {0}")]
    IndexFailed(#[source] anyhow::Error),
}

/// Ensures the root folder exists and `operator` holds writer access on it
///
/// # Errors
/// Any failure aborts the pass; index changes are rolled back. If the root
/// folder was created by this pass and the grant fails, the folder is
/// deleted again before [`BootstrapError::GrantFailed`] is returned.
#[tracing::instrument(skip(remote, index, operator), fields(operator = %operator))]
pub async fn bootstrap(
    remote: &dyn IRemoteStore,
    index: &dyn IRecordIndex,
    root_name: &str,
    operator: &Email,
) -> Result<BootstrapReport, BootstrapError> {
    let existing = remote
        .find_container(root_name, None)
        .await
        .map_err(BootstrapError::RemoteFailed)?;

    match existing {
        Some(root_id) => {
            info!(root = %root_id, "Root folder found");
            let granted = ensure_operator_grant(remote, index, &root_id, operator).await?;
            Ok(BootstrapReport {
                root_id,
                created_container: false,
                granted,
            })
        }
        None => {
            let root_id = create_root(remote, index, root_name, operator).await?;
            Ok(BootstrapReport {
                root_id,
                created_container: true,
                granted: true,
            })
        }
    }
}

/// Creates the root folder and grants the operator access, compensating on
/// grant failure
async fn create_root(
    remote: &dyn IRemoteStore,
    index: &dyn IRecordIndex,
    root_name: &str,
    operator: &Email,
) -> Result<RemoteId, BootstrapError> {
    let root_id = remote
        .create_container(root_name, None)
        .await
        .map_err(BootstrapError::RemoteFailed)?;
    info!(root = %root_id, name = root_name, "Created root folder");

    let permission_id = match remote.grant_access(&root_id, operator).await {
        Ok(id) => id,
        Err(source) => {
            error!(root = %root_id, error = %format!("{source:#}"), "Grant failed on new root folder, removing it");
            let compensated = compensate(remote, &root_id).await;
            return Err(BootstrapError::GrantFailed {
                source,
                compensated,
            });
        }
    };

    let tx = index.begin().await.map_err(BootstrapError::IndexFailed)?;
    record_grant(tx, permission_id, operator).await?;
    Ok(root_id)
}

/// Removes a root folder created moments earlier; returns whether it worked
async fn compensate(remote: &dyn IRemoteStore, root_id: &RemoteId) -> bool {
    match remote.remove_container(root_id).await {
        Ok(()) => {
            warn!(root = %root_id, "Removed partially set-up root folder");
            true
        }
        Err(e) => {
            error!(root = %root_id, error = %format!("{e:#}"), "Could not remove root folder; it is left orphaned");
            false
        }
    }
}

/// Grants the operator access on an existing root unless the index already
/// knows a live writer grant for them
async fn ensure_operator_grant(
    remote: &dyn IRemoteStore,
    index: &dyn IRecordIndex,
    root_id: &RemoteId,
    operator: &Email,
) -> Result<bool, BootstrapError> {
    let access = remote
        .list_access(root_id)
        .await
        .map_err(BootstrapError::RemoteFailed)?;

    let writer_ids: Vec<PermissionId> = access
        .into_iter()
        .filter(|entry| entry.role == AccessRole::Writer)
        .map(|entry| entry.permission_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let mut tx = index.begin().await.map_err(BootstrapError::IndexFailed)?;

    if !writer_ids.is_empty() {
        let known = tx
            .find_grants_by_permission_ids(&writer_ids)
            .await
            .map_err(BootstrapError::IndexFailed)?;

        if known.iter().any(|grant| grant.email == *operator) {
            info!(writers = writer_ids.len(), "Operator already holds writer access");
            tx.rollback().await.map_err(BootstrapError::IndexFailed)?;
            return Ok(false);
        }
        info!(writers = writer_ids.len(), "Operator not among indexed writers");
    } else {
        info!("Root folder has no writer grants");
    }

    let permission_id = remote
        .grant_access(root_id, operator)
        .await
        .map_err(|source| BootstrapError::GrantFailed {
            source,
            compensated: false,
        })?;

    record_grant(tx, permission_id, operator).await?;
    Ok(true)
}

async fn record_grant(
    mut tx: Box<dyn IIndexTransaction>,
    permission_id: PermissionId,
    operator: &Email,
) -> Result<(), BootstrapError> {
    let grant = tx
        .insert_grant(&PermissionGrant::new(permission_id, operator.clone()))
        .await
        .map_err(BootstrapError::IndexFailed)?;
    tx.commit().await.map_err(BootstrapError::IndexFailed)?;

    info!(permission = %grant.permission_id, "Recorded operator grant");
    Ok(())
}
