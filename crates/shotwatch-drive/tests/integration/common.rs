//! Shared test helpers for Drive API integration tests
//!
//! Each helper starts a wiremock server and returns a DriveRemoteStore
//! pointing at it. Retry delays are shortened so throttling tests finish
//! quickly.

use std::time::Duration;

use shotwatch_core::domain::{Email, PermissionId, RemoteId};
use shotwatch_drive::client::DriveClient;
use shotwatch_drive::retry::RetryPolicy;
use shotwatch_drive::DriveRemoteStore;
use wiremock::MockServer;

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Retry policy with millisecond backoff
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    }
}

/// Starts a mock server and returns a store wired to it.
pub async fn setup_drive_mock() -> (MockServer, DriveRemoteStore) {
    let server = MockServer::start().await;
    let client =
        DriveClient::with_base_url("test-access-token", server.uri()).with_retry_policy(fast_retry(2));
    (server, DriveRemoteStore::new(client))
}

pub fn rid(id: &str) -> RemoteId {
    RemoteId::new(id.to_string()).unwrap()
}

pub fn pid(id: &str) -> PermissionId {
    PermissionId::new(id.to_string()).unwrap()
}

pub fn email(value: &str) -> Email {
    Email::new(value.to_string()).unwrap()
}
