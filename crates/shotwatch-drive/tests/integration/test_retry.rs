//! Throttling retries through the store

use serde_json::json;
use shotwatch_core::ports::IRemoteStore;
use shotwatch_drive::client::DriveClient;
use shotwatch_drive::{DriveError, DriveRemoteStore};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::common::{self, rid};

#[tokio::test]
async fn test_retries_after_throttling() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "after-retry"})))
        .expect(1)
        .mount(&server)
        .await;

    let id = store.create_container("folder", None).await.unwrap();
    assert_eq!(id, rid("after-retry"));
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_url("tok", server.uri())
        .with_retry_policy(common::fast_retry(1));
    let store = DriveRemoteStore::new(client);

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let err = store.find_container("x", None).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::TooManyRequests { .. })
    ));
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = store.find_container("x", None).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::ServerError(_))
    ));
}
