//! Token refresh against a mocked Google token endpoint

use chrono::{Duration, Utc};
use serde_json::json;
use shotwatch_core::ports::{IRemoteStore, Tokens};
use shotwatch_drive::auth::{OAuth2Config, PKCEFlow, TokenManager};
use shotwatch_drive::client::DriveClient;
use shotwatch_drive::DriveRemoteStore;
use std::sync::Arc;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn oauth_config(server: &MockServer) -> OAuth2Config {
    OAuth2Config {
        client_id: "client-1".to_string(),
        client_secret: Some("secret".to_string()),
        auth_url: format!("{}/auth", server.uri()),
        token_url: format!("{}/token", server.uri()),
        redirect_uri: "http://127.0.0.1:8400/callback".to_string(),
        scopes: vec!["https://www.googleapis.com/auth/drive".to_string()],
    }
}

fn tokens(access: &str, expires_in_minutes: i64) -> Tokens {
    Tokens {
        access_token: access.to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expires_at: Utc::now() + Duration::minutes(expires_in_minutes),
    }
}

#[tokio::test]
async fn test_fresh_token_is_not_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let flow = PKCEFlow::new(&oauth_config(&server)).unwrap();
    let manager = TokenManager::new(flow, tokens("still-good", 30));

    assert_eq!(manager.access_token().await.unwrap(), "still-good");
}

#[tokio::test]
async fn test_expiring_token_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "renewed",
            "expires_in": 3599,
            "token_type": "Bearer",
            "scope": "https://www.googleapis.com/auth/drive"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let flow = PKCEFlow::new(&oauth_config(&server)).unwrap();
    let manager = TokenManager::new(flow, tokens("stale", 2));

    assert_eq!(manager.access_token().await.unwrap(), "renewed");
    // Second call uses the cached token
    assert_eq!(manager.access_token().await.unwrap(), "renewed");
}

#[tokio::test]
async fn test_refresh_keeps_existing_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "renewed",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let flow = PKCEFlow::new(&oauth_config(&server)).unwrap();
    let refreshed = flow.refresh_token("refresh-1").await.unwrap();

    assert_eq!(refreshed.access_token, "renewed");
    assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-1"));
    assert!(!refreshed.is_expired());
}

#[tokio::test]
async fn test_expired_token_without_refresh_token_fails() {
    let server = MockServer::start().await;
    let flow = PKCEFlow::new(&oauth_config(&server)).unwrap();
    let manager = TokenManager::new(
        flow,
        Tokens {
            access_token: "stale".to_string(),
            refresh_token: None,
            expires_at: Utc::now() - Duration::minutes(1),
        },
    );

    assert!(manager.access_token().await.is_err());
}

#[tokio::test]
async fn test_store_sends_refreshed_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "renewed",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(header("authorization", "Bearer renewed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": []})))
        .expect(1)
        .mount(&server)
        .await;

    let flow = PKCEFlow::new(&oauth_config(&server)).unwrap();
    let manager = Arc::new(TokenManager::new(flow, tokens("stale", 1)));
    let store = DriveRemoteStore::new(DriveClient::with_base_url("", server.uri()))
        .with_token_manager(manager);

    assert!(store.find_container("x", None).await.unwrap().is_none());
}
