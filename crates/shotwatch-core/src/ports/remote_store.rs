//! Remote store port (driven/secondary port)
//!
//! This module defines the interface to the remote content store that holds
//! containers (folders), uploaded objects and their access grants. The
//! primary implementation targets Google Drive v3.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because transport errors are adapter-specific.
//!   The one failure the engine must tell apart, a refused container
//!   deletion, is carried as [`RemoteStoreError::IsContainer`] so callers can
//!   `downcast_ref` it out of the `anyhow::Error`.
//! - Uses `#[async_trait]` for async trait methods.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::newtypes::{Email, PermissionId, RemoteId};

// ============================================================================
// Tokens
// ============================================================================

/// OAuth tokens used to authorize remote store requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for refreshing the access token without user interaction
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the access token will expire within the given duration
    pub fn expires_within(&self, duration: chrono::Duration) -> bool {
        Utc::now() + duration >= self.expires_at
    }
}

// ============================================================================
// Access entries
// ============================================================================

/// Role of an access grant as reported by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessRole {
    Owner,
    Organizer,
    FileOrganizer,
    Writer,
    Commenter,
    Reader,
    /// Any role this build does not know about
    #[serde(other)]
    Other,
}

impl AccessRole {
    /// Parse the wire representation; unknown roles map to [`AccessRole::Other`]
    pub fn from_wire(role: &str) -> Self {
        match role {
            "owner" => Self::Owner,
            "organizer" => Self::Organizer,
            "fileOrganizer" => Self::FileOrganizer,
            "writer" => Self::Writer,
            "commenter" => Self::Commenter,
            "reader" => Self::Reader,
            _ => Self::Other,
        }
    }
}

/// One entry of a container's access list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEntry {
    pub permission_id: PermissionId,
    pub role: AccessRole,
}

// ============================================================================
// Errors with meaning to the engine
// ============================================================================

/// Typed remote failures the engine reacts to explicitly
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteStoreError {
    /// `delete_object` was called on a container; nothing was deleted
    #[error("Cannot delete container {0} as an object")]
    IsContainer(RemoteId),
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for remote store operations
///
/// All ids are opaque remote identifiers. Implementations must be safe to
/// share across tasks behind an `Arc`.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Look up a non-trashed container whose name contains `name`
    ///
    /// With `parent` set, only direct children of that container match.
    /// When several containers match, the first one in listing order is
    /// returned.
    async fn find_container(
        &self,
        name: &str,
        parent: Option<&RemoteId>,
    ) -> anyhow::Result<Option<RemoteId>>;

    /// Create a container named `name` under `parent` (or the store root)
    async fn create_container(
        &self,
        name: &str,
        parent: Option<&RemoteId>,
    ) -> anyhow::Result<RemoteId>;

    /// Upload the bytes of `local_path` as `name` into `parent`
    async fn upload_object(
        &self,
        name: &str,
        local_path: &Path,
        mime_type: &str,
        parent: &RemoteId,
    ) -> anyhow::Result<RemoteId>;

    /// Delete a single object
    ///
    /// # Errors
    /// Fails with [`RemoteStoreError::IsContainer`] if `id` names a container
    async fn delete_object(&self, id: &RemoteId) -> anyhow::Result<()>;

    /// Delete a container outright
    ///
    /// Only used to compensate for a container created moments earlier
    /// whose setup could not be completed.
    async fn remove_container(&self, id: &RemoteId) -> anyhow::Result<()>;

    /// Grant `email` writer access on `container`
    async fn grant_access(&self, container: &RemoteId, email: &Email)
        -> anyhow::Result<PermissionId>;

    /// List every access grant on `container`
    async fn list_access(&self, container: &RemoteId) -> anyhow::Result<Vec<AccessEntry>>;

    /// Revoke a single access grant on `container`
    async fn revoke_access(
        &self,
        container: &RemoteId,
        permission: &PermissionId,
    ) -> anyhow::Result<()>;
}
