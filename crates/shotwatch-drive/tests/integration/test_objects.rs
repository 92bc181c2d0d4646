//! Upload and guarded deletion of files

use serde_json::json;
use shotwatch_core::ports::{IRemoteStore, RemoteStoreError};
use shotwatch_drive::DriveError;
use wiremock::{
    matchers::{body_string_contains, header_regex, method, path, query_param},
    Mock, ResponseTemplate,
};

use crate::common::{self, rid, FOLDER_MIME};

#[tokio::test]
async fn test_upload_object_sends_multipart_body() {
    let (server, store) = common::setup_drive_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("shot.png");
    std::fs::write(&local, b"\x89PNG-fake-bytes").unwrap();

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "multipart"))
        .and(query_param("fields", "id"))
        .and(header_regex("content-type", "^multipart/related; boundary=shotwatch-"))
        .and(body_string_contains(r#""name":"shot.png""#))
        .and(body_string_contains(r#""parents":["daily-1"]"#))
        .and(body_string_contains("Content-Type: image/png"))
        .and(body_string_contains("PNG-fake-bytes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "file-001"})))
        .expect(1)
        .mount(&server)
        .await;

    let id = store
        .upload_object("shot.png", &local, "image/png", &rid("daily-1"))
        .await
        .expect("upload failed");

    assert_eq!(id, rid("file-001"));
}

#[tokio::test]
async fn test_upload_object_missing_local_file() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "never"})))
        .expect(0)
        .mount(&server)
        .await;

    let err = store
        .upload_object(
            "gone.png",
            std::path::Path::new("/nonexistent/gone.png"),
            "image/png",
            &rid("daily-1"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<DriveError>(), Some(DriveError::Io(_))));
}

#[tokio::test]
async fn test_delete_object_checks_type_then_deletes() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-001"))
        .and(query_param("fields", "id,mimeType"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-001",
            "mimeType": "image/png"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/file-001"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store.delete_object(&rid("file-001")).await.unwrap();
}

#[tokio::test]
async fn test_delete_object_refuses_folder() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/daily-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "daily-1",
            "mimeType": FOLDER_MIME
        })))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/daily-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let err = store.delete_object(&rid("daily-1")).await.unwrap_err();
    assert_eq!(
        err.downcast_ref::<RemoteStoreError>(),
        Some(&RemoteStoreError::IsContainer(rid("daily-1")))
    );
}

#[tokio::test]
async fn test_delete_object_not_found() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "File not found: ghost."}
        })))
        .mount(&server)
        .await;

    let err = store.delete_object(&rid("ghost")).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_remove_container_deletes_directly() {
    let (server, store) = common::setup_drive_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/root-folder-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store.remove_container(&rid("root-folder-1")).await.unwrap();
}
