//! Rows held by the record index
//!
//! A [`FileRecord`] exists only for objects that were successfully uploaded
//! and not yet deleted remotely. A [`PermissionGrant`] remembers which
//! operator emails were already granted access on the root container.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{Email, PermissionId, RecordId, RemoteId};

/// One uploaded object known to both the remote store and the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Row id, `None` until the index assigns one
    pub id: Option<RecordId>,
    /// Remote object id returned by the upload
    pub remote_id: RemoteId,
    /// Filename relative to the watched directory
    pub name: String,
    /// Daily container the object was uploaded into
    pub container_id: RemoteId,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Build an unsaved record stamped with the current time
    #[must_use]
    pub fn new(remote_id: RemoteId, name: impl Into<String>, container_id: RemoteId) -> Self {
        Self {
            id: None,
            remote_id,
            name: name.into(),
            container_id,
            created_at: Utc::now(),
        }
    }

    /// Return a copy carrying the index-assigned row id
    #[must_use]
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }
}

/// One writer grant issued to an operator email on the root container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub id: Option<RecordId>,
    pub permission_id: PermissionId,
    pub email: Email,
}

impl PermissionGrant {
    #[must_use]
    pub fn new(permission_id: PermissionId, email: Email) -> Self {
        Self {
            id: None,
            permission_id,
            email,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }
}
