//! Folder lookup and creation against a mocked Drive API

use serde_json::json;
use shotwatch_core::ports::IRemoteStore;
use shotwatch_drive::DriveError;
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, ResponseTemplate,
};

use crate::common::{self, rid, FOLDER_MIME};

#[tokio::test]
async fn test_find_container_at_root_level() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(header("authorization", "Bearer test-access-token"))
        .and(query_param(
            "q",
            "name contains 'SS-Watcher-Backup-GDrive-Folder' and mimeType='application/vnd.google-apps.folder' and trashed=false",
        ))
        .and(query_param("fields", "files(id,name)"))
        .and(query_param("spaces", "drive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {"id": "root-folder-1", "name": "SS-Watcher-Backup-GDrive-Folder"},
                {"id": "root-folder-2", "name": "SS-Watcher-Backup-GDrive-Folder (old)"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let found = store
        .find_container("SS-Watcher-Backup-GDrive-Folder", None)
        .await
        .expect("find failed");

    assert_eq!(found, Some(rid("root-folder-1")));
}

#[tokio::test]
async fn test_find_container_scoped_to_parent() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param(
            "q",
            "name contains 'SS_2026-10-16' and mimeType='application/vnd.google-apps.folder' and 'root-folder-1' in parents and trashed=false",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"id": "daily-1", "name": "SS_2026-10-16_k3j9a"}]
        })))
        .mount(&server)
        .await;

    let found = store
        .find_container("SS_2026-10-16", Some(&rid("root-folder-1")))
        .await
        .unwrap();

    assert_eq!(found, Some(rid("daily-1")));
}

#[tokio::test]
async fn test_find_container_none() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": []})))
        .mount(&server)
        .await;

    let found = store.find_container("missing", None).await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_create_container_defaults_to_root_parent() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(query_param("fields", "id"))
        .and(body_json(json!({
            "name": "SS-Watcher-Backup-GDrive-Folder",
            "mimeType": FOLDER_MIME,
            "parents": ["root"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new-root"})))
        .expect(1)
        .mount(&server)
        .await;

    let id = store
        .create_container("SS-Watcher-Backup-GDrive-Folder", None)
        .await
        .unwrap();
    assert_eq!(id, rid("new-root"));
}

#[tokio::test]
async fn test_create_container_under_parent() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(body_json(json!({
            "name": "SS_2026-10-16_ab12c",
            "mimeType": FOLDER_MIME,
            "parents": ["root-folder-1"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "daily-2"})))
        .expect(1)
        .mount(&server)
        .await;

    let id = store
        .create_container("SS_2026-10-16_ab12c", Some(&rid("root-folder-1")))
        .await
        .unwrap();
    assert_eq!(id, rid("daily-2"));
}

#[tokio::test]
async fn test_find_container_unauthorized() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "Invalid Credentials"}
        })))
        .mount(&server)
        .await;

    let err = store.find_container("anything", None).await.unwrap_err();
    match err.downcast_ref::<DriveError>() {
        Some(DriveError::Unauthorized(message)) => assert_eq!(message, "Invalid Credentials"),
        other => panic!("Expected Unauthorized, got {:?}", other),
    }
}
