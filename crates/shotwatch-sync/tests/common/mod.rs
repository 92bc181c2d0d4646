//! Shared fixtures for the reconciliation tests
//!
//! `MockRemoteStore` keeps folders, files and permissions in memory and
//! records every call so tests can assert on exactly which remote
//! operations ran. The record index is the real SQLite adapter on an
//! in-memory database.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shotwatch_core::domain::{Email, FileRecord, PermissionGrant, PermissionId, RemoteId};
use shotwatch_core::ports::{
    AccessEntry, AccessRole, IIndexTransaction, IRecordIndex, IRemoteStore, RemoteStoreError,
};
use shotwatch_index::{DatabasePool, SqliteRecordIndex};

pub const ROOT_NAME: &str = "SS-Watcher-Backup-GDrive-Folder";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FindContainer { name: String, parent: Option<RemoteId> },
    CreateContainer { name: String, parent: Option<RemoteId> },
    Upload { name: String, parent: RemoteId },
    DeleteObject(RemoteId),
    RemoveContainer(RemoteId),
    Grant { container: RemoteId, email: Email },
    ListAccess(RemoteId),
    Revoke { container: RemoteId, permission: PermissionId },
}

impl Call {
    /// Whether the call changes remote state
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::FindContainer { .. } | Call::ListAccess(_))
    }
}

#[derive(Debug, Clone)]
struct Folder {
    id: RemoteId,
    name: String,
    parent: Option<RemoteId>,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    folders: Vec<Folder>,
    objects: Vec<(RemoteId, String, RemoteId)>,
    permissions: Vec<(RemoteId, AccessEntry)>,
    next_id: u64,
    fail_grants: bool,
    fail_uploads: bool,
    fail_deletes: bool,
    fail_removals: bool,
    upload_delay: Option<Duration>,
}

impl State {
    fn mint(&mut self, prefix: &str) -> RemoteId {
        self.next_id += 1;
        RemoteId::new(format!("{}{}", prefix, self.next_id)).unwrap()
    }
}

#[derive(Default)]
pub struct MockRemoteStore {
    state: Mutex<State>,
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a folder without recording a call
    pub fn seed_folder(&self, name: &str, parent: Option<&RemoteId>) -> RemoteId {
        let mut state = self.state.lock().unwrap();
        let id = state.mint("folder");
        state.folders.push(Folder {
            id: id.clone(),
            name: name.to_string(),
            parent: parent.cloned(),
        });
        id
    }

    /// Seeds a plain object inside `parent`
    pub fn seed_object(&self, name: &str, parent: &RemoteId) -> RemoteId {
        let mut state = self.state.lock().unwrap();
        let id = state.mint("file");
        state.objects.push((id.clone(), name.to_string(), parent.clone()));
        id
    }

    pub fn seed_permission(&self, container: &RemoteId, permission: &str, role: AccessRole) {
        let mut state = self.state.lock().unwrap();
        state.permissions.push((
            container.clone(),
            AccessEntry {
                permission_id: PermissionId::new(permission.to_string()).unwrap(),
                role,
            },
        ));
    }

    pub fn fail_grants(&self) {
        self.state.lock().unwrap().fail_grants = true;
    }

    pub fn fail_uploads(&self) {
        self.state.lock().unwrap().fail_uploads = true;
    }

    pub fn fail_deletes(&self) {
        self.state.lock().unwrap().fail_deletes = true;
    }

    pub fn fail_removals(&self) {
        self.state.lock().unwrap().fail_removals = true;
    }

    pub fn slow_uploads(&self, delay: Duration) {
        self.state.lock().unwrap().upload_delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn folder_exists(&self, id: &RemoteId) -> bool {
        self.state.lock().unwrap().folders.iter().any(|f| &f.id == id)
    }

    pub fn folder_names_under(&self, parent: &RemoteId) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .folders
            .iter()
            .filter(|f| f.parent.as_ref() == Some(parent))
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn object_ids(&self) -> HashSet<RemoteId> {
        self.state
            .lock()
            .unwrap()
            .objects
            .iter()
            .map(|(id, _, _)| id.clone())
            .collect()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait::async_trait]
impl IRemoteStore for MockRemoteStore {
    async fn find_container(
        &self,
        name: &str,
        parent: Option<&RemoteId>,
    ) -> anyhow::Result<Option<RemoteId>> {
        self.record(Call::FindContainer {
            name: name.to_string(),
            parent: parent.cloned(),
        });
        let state = self.state.lock().unwrap();
        Ok(state
            .folders
            .iter()
            .find(|f| f.name.contains(name) && (parent.is_none() || f.parent.as_ref() == parent))
            .map(|f| f.id.clone()))
    }

    async fn create_container(
        &self,
        name: &str,
        parent: Option<&RemoteId>,
    ) -> anyhow::Result<RemoteId> {
        self.record(Call::CreateContainer {
            name: name.to_string(),
            parent: parent.cloned(),
        });
        let mut state = self.state.lock().unwrap();
        let id = state.mint("folder");
        state.folders.push(Folder {
            id: id.clone(),
            name: name.to_string(),
            parent: parent.cloned(),
        });
        Ok(id)
    }

    async fn upload_object(
        &self,
        name: &str,
        _local_path: &Path,
        _mime_type: &str,
        parent: &RemoteId,
    ) -> anyhow::Result<RemoteId> {
        self.record(Call::Upload {
            name: name.to_string(),
            parent: parent.clone(),
        });
        let (delay, fail) = {
            let state = self.state.lock().unwrap();
            (state.upload_delay, state.fail_uploads)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            anyhow::bail!("upload rejected: 500 backend error");
        }

        let mut state = self.state.lock().unwrap();
        let id = state.mint("file");
        state.objects.push((id.clone(), name.to_string(), parent.clone()));
        Ok(id)
    }

    async fn delete_object(&self, id: &RemoteId) -> anyhow::Result<()> {
        self.record(Call::DeleteObject(id.clone()));
        let mut state = self.state.lock().unwrap();
        if state.folders.iter().any(|f| &f.id == id) {
            return Err(RemoteStoreError::IsContainer(id.clone()).into());
        }
        if state.fail_deletes {
            anyhow::bail!("delete rejected: 503 backend unavailable");
        }
        let before = state.objects.len();
        state.objects.retain(|(oid, _, _)| oid != id);
        if state.objects.len() == before {
            anyhow::bail!("Not found: {}", id);
        }
        Ok(())
    }

    async fn remove_container(&self, id: &RemoteId) -> anyhow::Result<()> {
        self.record(Call::RemoveContainer(id.clone()));
        let mut state = self.state.lock().unwrap();
        if state.fail_removals {
            anyhow::bail!("remove rejected");
        }
        state.folders.retain(|f| &f.id != id);
        Ok(())
    }

    async fn grant_access(
        &self,
        container: &RemoteId,
        email: &Email,
    ) -> anyhow::Result<PermissionId> {
        self.record(Call::Grant {
            container: container.clone(),
            email: email.clone(),
        });
        let mut state = self.state.lock().unwrap();
        if state.fail_grants {
            anyhow::bail!("grant rejected: 403 sharing disabled");
        }
        state.next_id += 1;
        let permission = PermissionId::new(format!("perm{}", state.next_id)).unwrap();
        state.permissions.push((
            container.clone(),
            AccessEntry {
                permission_id: permission.clone(),
                role: AccessRole::Writer,
            },
        ));
        Ok(permission)
    }

    async fn list_access(&self, container: &RemoteId) -> anyhow::Result<Vec<AccessEntry>> {
        self.record(Call::ListAccess(container.clone()));
        let state = self.state.lock().unwrap();
        Ok(state
            .permissions
            .iter()
            .filter(|(c, _)| c == container)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn revoke_access(
        &self,
        container: &RemoteId,
        permission: &PermissionId,
    ) -> anyhow::Result<()> {
        self.record(Call::Revoke {
            container: container.clone(),
            permission: permission.clone(),
        });
        let mut state = self.state.lock().unwrap();
        state
            .permissions
            .retain(|(c, e)| !(c == container && &e.permission_id == permission));
        Ok(())
    }
}

// ============================================================================
// Index helpers
// ============================================================================

pub async fn index() -> Arc<SqliteRecordIndex> {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    Arc::new(SqliteRecordIndex::new(pool.pool().clone()))
}

pub async fn files(index: &SqliteRecordIndex) -> Vec<FileRecord> {
    let mut tx = index.begin().await.unwrap();
    let files = tx.list_files().await.unwrap();
    tx.rollback().await.unwrap();
    files
}

pub async fn insert_file(index: &SqliteRecordIndex, record: FileRecord) -> FileRecord {
    let mut tx = index.begin().await.unwrap();
    let record = tx.insert_file(&record).await.unwrap();
    tx.commit().await.unwrap();
    record
}

pub async fn grants_for(index: &SqliteRecordIndex, ids: &[&str]) -> Vec<PermissionGrant> {
    let ids: Vec<PermissionId> = ids.iter().map(|s| pid(s)).collect();
    let mut tx = index.begin().await.unwrap();
    let grants = tx.find_grants_by_permission_ids(&ids).await.unwrap();
    tx.rollback().await.unwrap();
    grants
}

pub async fn insert_grant(index: &SqliteRecordIndex, permission: &str, address: &str) {
    let mut tx = index.begin().await.unwrap();
    tx.insert_grant(&PermissionGrant::new(pid(permission), email(address)))
        .await
        .unwrap();
    tx.commit().await.unwrap();
}

// ============================================================================
// Fault injection
// ============================================================================

#[derive(Default)]
struct Faults {
    file_inserts: AtomicBool,
    file_deletes: AtomicBool,
    grant_inserts: AtomicBool,
}

/// Record index that delegates to SQLite but can be told to fail writes
///
/// Failing statements leave the wrapped transaction uncommitted, so the
/// underlying database keeps its previous state.
pub struct FaultyIndex {
    inner: Arc<SqliteRecordIndex>,
    faults: Arc<Faults>,
}

impl FaultyIndex {
    pub fn new(inner: Arc<SqliteRecordIndex>) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    pub fn fail_file_inserts(&self) {
        self.faults.file_inserts.store(true, Ordering::SeqCst);
    }

    pub fn fail_file_deletes(&self) {
        self.faults.file_deletes.store(true, Ordering::SeqCst);
    }

    pub fn fail_grant_inserts(&self) {
        self.faults.grant_inserts.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl IRecordIndex for FaultyIndex {
    async fn begin(&self) -> anyhow::Result<Box<dyn IIndexTransaction>> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            faults: self.faults.clone(),
        }))
    }
}

struct FaultyTransaction {
    inner: Box<dyn IIndexTransaction>,
    faults: Arc<Faults>,
}

#[async_trait::async_trait]
impl IIndexTransaction for FaultyTransaction {
    async fn find_file_by_name(&mut self, name: &str) -> anyhow::Result<Option<FileRecord>> {
        self.inner.find_file_by_name(name).await
    }

    async fn insert_file(&mut self, record: &FileRecord) -> anyhow::Result<FileRecord> {
        if self.faults.file_inserts.load(Ordering::SeqCst) {
            anyhow::bail!("disk I/O error");
        }
        self.inner.insert_file(record).await
    }

    async fn delete_file_by_remote_id(&mut self, remote_id: &RemoteId) -> anyhow::Result<u64> {
        if self.faults.file_deletes.load(Ordering::SeqCst) {
            anyhow::bail!("database is locked");
        }
        self.inner.delete_file_by_remote_id(remote_id).await
    }

    async fn list_files(&mut self) -> anyhow::Result<Vec<FileRecord>> {
        self.inner.list_files().await
    }

    async fn find_grants_by_permission_ids(
        &mut self,
        ids: &[PermissionId],
    ) -> anyhow::Result<Vec<PermissionGrant>> {
        self.inner.find_grants_by_permission_ids(ids).await
    }

    async fn insert_grant(&mut self, grant: &PermissionGrant) -> anyhow::Result<PermissionGrant> {
        if self.faults.grant_inserts.load(Ordering::SeqCst) {
            anyhow::bail!("disk I/O error");
        }
        self.inner.insert_grant(grant).await
    }

    async fn delete_grant_by_permission_id(&mut self, id: &PermissionId) -> anyhow::Result<u64> {
        self.inner.delete_grant_by_permission_id(id).await
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        self.inner.rollback().await
    }
}

pub fn rid(s: &str) -> RemoteId {
    RemoteId::new(s.to_string()).unwrap()
}

pub fn pid(s: &str) -> PermissionId {
    PermissionId::new(s.to_string()).unwrap()
}

pub fn email(s: &str) -> Email {
    Email::new(s.to_string()).unwrap()
}

// ============================================================================
// Remote inspection helpers
// ============================================================================

impl MockRemoteStore {
    /// Permission ids currently on `container`
    pub fn list_permission_ids(&self, container: &RemoteId) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .permissions
            .iter()
            .filter(|(c, _)| c == container)
            .map(|(_, e)| e.permission_id.as_str().to_string())
            .collect()
    }

    /// Id of a top-level folder named like the root, if any
    pub fn find_root(&self) -> Option<RemoteId> {
        self.state
            .lock()
            .unwrap()
            .folders
            .iter()
            .find(|f| f.parent.is_none() && f.name.contains(ROOT_NAME))
            .map(|f| f.id.clone())
    }
}
