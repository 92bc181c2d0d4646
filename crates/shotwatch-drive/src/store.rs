//! Drive v3 implementation of [`IRemoteStore`]
//!
//! Folders play the role of containers and files the role of objects.
//! Every request goes through [`DriveClient::execute`], so throttling is
//! retried and error statuses surface as [`DriveError`] inside the
//! returned `anyhow::Error`.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use shotwatch_core::domain::{Email, PermissionId, RemoteId};
use shotwatch_core::ports::{AccessEntry, AccessRole, IRemoteStore, RemoteStoreError};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

use crate::auth::TokenManager;
use crate::client::DriveClient;
use crate::DriveError;

/// MIME type Drive uses to mark folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Parent used when a folder is created without one
const ROOT_PARENT: &str = "root";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileRef {
    id: String,
    #[serde(default)]
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PermissionRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PermissionList {
    #[serde(default)]
    permissions: Vec<PermissionEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PermissionEntry {
    id: String,
    role: String,
}

// ============================================================================
// Query helpers
// ============================================================================

/// Quotes a value for use inside a Drive `q` string literal
fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Builds the folder search expression
///
/// `name contains` is a prefix-of-word match on Drive, so a search for
/// `SS_2026-10-16` also finds `SS_2026-10-16_a1b2c`.
fn folder_query(name: &str, parent: Option<&RemoteId>) -> String {
    let mut q = format!(
        "name contains {} and mimeType='{}'",
        quote_literal(name),
        FOLDER_MIME_TYPE
    );
    if let Some(parent) = parent {
        q.push_str(&format!(" and {} in parents", quote_literal(parent.as_str())));
    }
    q.push_str(" and trashed=false");
    q
}

fn remote_id(raw: String) -> anyhow::Result<RemoteId> {
    RemoteId::new(raw).map_err(|e| DriveError::InvalidResponse(e.to_string()).into())
}

/// Assembles a `multipart/related` upload body
fn multipart_body(boundary: &str, metadata: &serde_json::Value, mime_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: {mime_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

// ============================================================================
// DriveRemoteStore
// ============================================================================

/// Google Drive backed remote store
pub struct DriveRemoteStore {
    client: RwLock<DriveClient>,
    tokens: Option<Arc<TokenManager>>,
}

impl DriveRemoteStore {
    /// Wraps a client whose access token is managed by the caller
    pub fn new(client: DriveClient) -> Self {
        Self {
            client: RwLock::new(client),
            tokens: None,
        }
    }

    /// Refresh the client's access token from `tokens` before each request
    pub fn with_token_manager(mut self, tokens: Arc<TokenManager>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    async fn client(&self) -> anyhow::Result<RwLockReadGuard<'_, DriveClient>> {
        if let Some(tokens) = &self.tokens {
            let token = tokens.access_token().await?;
            let needs_update = self.client.read().await.access_token() != token;
            if needs_update {
                self.client.write().await.set_access_token(token);
            }
        }
        Ok(self.client.read().await)
    }
}

#[async_trait::async_trait]
impl IRemoteStore for DriveRemoteStore {
    async fn find_container(
        &self,
        name: &str,
        parent: Option<&RemoteId>,
    ) -> anyhow::Result<Option<RemoteId>> {
        let client = self.client().await?;
        let q = folder_query(name, parent);
        debug!(%q, "Searching for folder");

        let request = client.request(Method::GET, "/drive/v3/files").query(&[
            ("q", q.as_str()),
            ("fields", "files(id,name)"),
            ("spaces", "drive"),
        ]);
        let list: FileList = client
            .execute(request)
            .await
            .with_context(|| format!("Failed to search for folder '{}'", name))?
            .json()
            .await
            .map_err(DriveError::from)?;

        match list.files.into_iter().next() {
            Some(file) => Ok(Some(remote_id(file.id)?)),
            None => Ok(None),
        }
    }

    async fn create_container(
        &self,
        name: &str,
        parent: Option<&RemoteId>,
    ) -> anyhow::Result<RemoteId> {
        let client = self.client().await?;
        let parent = parent.map(RemoteId::as_str).unwrap_or(ROOT_PARENT);
        let body = json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent],
        });

        let request = client
            .request(Method::POST, "/drive/v3/files")
            .query(&[("fields", "id")])
            .json(&body);
        let created: FileRef = client
            .execute(request)
            .await
            .with_context(|| format!("Failed to create folder '{}'", name))?
            .json()
            .await
            .map_err(DriveError::from)?;

        let id = remote_id(created.id)?;
        info!(folder = name, id = %id, parent, "Created folder");
        Ok(id)
    }

    async fn upload_object(
        &self,
        name: &str,
        local_path: &Path,
        mime_type: &str,
        parent: &RemoteId,
    ) -> anyhow::Result<RemoteId> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(DriveError::from)
            .with_context(|| format!("Failed to read {}", local_path.display()))?;

        let boundary = format!("shotwatch-{}", uuid::Uuid::new_v4().simple());
        let metadata = json!({
            "name": name,
            "mimeType": mime_type,
            "parents": [parent.as_str()],
        });
        let body = multipart_body(&boundary, &metadata, mime_type, &bytes);

        let client = self.client().await?;
        let request = client
            .request(Method::POST, "/upload/drive/v3/files")
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(CONTENT_TYPE, format!("multipart/related; boundary={}", boundary))
            .body(body);
        let uploaded: FileRef = client
            .execute(request)
            .await
            .with_context(|| format!("Failed to upload '{}'", name))?
            .json()
            .await
            .map_err(DriveError::from)?;

        let id = remote_id(uploaded.id)?;
        info!(file = name, id = %id, size = bytes.len(), "Uploaded file");
        Ok(id)
    }

    async fn delete_object(&self, id: &RemoteId) -> anyhow::Result<()> {
        let client = self.client().await?;
        let path = format!("/drive/v3/files/{}", id);

        let request = client
            .request(Method::GET, &path)
            .query(&[("fields", "id,mimeType")]);
        let file: FileRef = client
            .execute(request)
            .await
            .with_context(|| format!("Failed to inspect {}", id))?
            .json()
            .await
            .map_err(DriveError::from)?;

        if file.mime_type.as_deref() == Some(FOLDER_MIME_TYPE) {
            return Err(RemoteStoreError::IsContainer(id.clone()).into());
        }

        client
            .execute(client.request(Method::DELETE, &path))
            .await
            .with_context(|| format!("Failed to delete {}", id))?;
        info!(id = %id, "Deleted file");
        Ok(())
    }

    async fn remove_container(&self, id: &RemoteId) -> anyhow::Result<()> {
        let client = self.client().await?;
        let path = format!("/drive/v3/files/{}", id);
        client
            .execute(client.request(Method::DELETE, &path))
            .await
            .with_context(|| format!("Failed to remove folder {}", id))?;
        info!(id = %id, "Removed folder");
        Ok(())
    }

    async fn grant_access(
        &self,
        container: &RemoteId,
        email: &Email,
    ) -> anyhow::Result<PermissionId> {
        let client = self.client().await?;
        let path = format!("/drive/v3/files/{}/permissions", container);
        let body = json!({
            "type": "user",
            "role": "writer",
            "emailAddress": email.as_str(),
        });

        let request = client
            .request(Method::POST, &path)
            .query(&[("fields", "id")])
            .json(&body);
        let granted: PermissionRef = client
            .execute(request)
            .await
            .with_context(|| format!("Failed to share folder {} with {}", container, email))?
            .json()
            .await
            .map_err(DriveError::from)?;

        let permission = PermissionId::new(granted.id)
            .map_err(|e| DriveError::InvalidResponse(e.to_string()))?;
        info!(folder = %container, %email, permission = %permission, "Granted writer access");
        Ok(permission)
    }

    async fn list_access(&self, container: &RemoteId) -> anyhow::Result<Vec<AccessEntry>> {
        let client = self.client().await?;
        let path = format!("/drive/v3/files/{}/permissions", container);
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = client.request(Method::GET, &path).query(&[
                ("supportsAllDrives", "true"),
                ("fields", "nextPageToken,permissions(id,role,type,emailAddress)"),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: PermissionList = client
                .execute(request)
                .await
                .with_context(|| format!("Failed to list permissions of {}", container))?
                .json()
                .await
                .map_err(DriveError::from)?;

            for entry in page.permissions {
                let permission_id = PermissionId::new(entry.id)
                    .map_err(|e| DriveError::InvalidResponse(e.to_string()))?;
                entries.push(AccessEntry {
                    permission_id,
                    role: AccessRole::from_wire(&entry.role),
                });
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(folder = %container, count = entries.len(), "Listed permissions");
        Ok(entries)
    }

    async fn revoke_access(
        &self,
        container: &RemoteId,
        permission: &PermissionId,
    ) -> anyhow::Result<()> {
        let client = self.client().await?;
        let path = format!("/drive/v3/files/{}/permissions/{}", container, permission);
        let request = client
            .request(Method::DELETE, &path)
            .query(&[("supportsAllDrives", "true")]);
        client
            .execute(request)
            .await
            .with_context(|| format!("Failed to revoke {} on {}", permission, container))?;
        info!(folder = %container, permission = %permission, "Revoked access");
        Ok(())
    }
}
