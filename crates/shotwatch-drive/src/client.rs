//! Google Drive API client
//!
//! Provides an authenticated HTTP client for the Drive v3 REST API. Handles
//! bearer headers, endpoint construction, throttling retries and mapping of
//! error statuses to [`DriveError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reqwest::Method;
//! use shotwatch_drive::client::DriveClient;
//!
//! # async fn example() -> Result<(), shotwatch_drive::DriveError> {
//! let client = DriveClient::new("access-token-here");
//! let request = client
//!     .request(Method::GET, "/drive/v3/files")
//!     .query(&[("pageSize", "1")]);
//! let response = client.execute(request).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;
use crate::DriveError;

/// Base URL for the Google APIs host serving Drive v3
const DRIVE_BASE_URL: &str = "https://www.googleapis.com";

// ============================================================================
// Error body
// ============================================================================

/// `{"error": {"code": 404, "message": "File not found: abc."}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Extracts the human-readable message from a Drive error body
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        })
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Google Drive API calls
///
/// Wraps `reqwest::Client` with authentication headers and base URL
/// construction. Every call should go through [`DriveClient::execute`] so
/// throttled requests are retried and failures are classified uniformly.
pub struct DriveClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
    /// Current OAuth2 access token
    access_token: String,
    retry: RetryPolicy,
}

impl DriveClient {
    /// Creates a new DriveClient with the given access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, DRIVE_BASE_URL)
    }

    /// Creates a new DriveClient with a custom base URL (useful for testing)
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Updates the access token (e.g., after a token refresh)
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
        debug!("Updated DriveClient access token");
    }

    /// Returns a reference to the current access token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to base URL (e.g., "/drive/v3/files")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    // ========================================================================
    // execute - throttling retries and status classification
    // ========================================================================

    /// Sends `request`, retrying on 429 and 503 responses.
    ///
    /// The request body must be buffered (not streamed) so it can be cloned
    /// for each attempt.
    ///
    /// # Errors
    /// - [`DriveError::TooManyRequests`] once retries are exhausted
    /// - [`DriveError::Unauthorized`], [`DriveError::Forbidden`],
    ///   [`DriveError::NotFound`], [`DriveError::ServerError`] or
    ///   [`DriveError::Api`] for other non-success statuses
    /// - [`DriveError::NetworkError`] if the request could not be sent
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response, DriveError> {
        for attempt in 0..=self.retry.max_retries {
            let this_attempt = request.try_clone().ok_or_else(|| {
                DriveError::InvalidResponse("request body cannot be retried".to_string())
            })?;

            let response = this_attempt.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
            {
                let header = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok());
                let delay = self.retry.delay_for(attempt, header);

                if attempt >= self.retry.max_retries {
                    warn!(
                        url = %response.url(),
                        attempts = attempt + 1,
                        "Throttling retry limit exhausted"
                    );
                    return Err(DriveError::TooManyRequests { retry_after: delay });
                }

                info!(
                    url = %response.url(),
                    status = status.as_u16(),
                    attempt,
                    retry_after_ms = delay.as_millis() as u64,
                    "Throttled by Drive, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if attempt > 0 {
                info!(url = %response.url(), attempt, "Request succeeded after retry");
            }

            return Self::check_status(response).await;
        }

        Err(DriveError::InvalidResponse(
            "retry loop exited unexpectedly".to_string(),
        ))
    }

    /// Maps a non-success response into the matching [`DriveError`]
    async fn check_status(response: Response) -> Result<Response, DriveError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        debug!(status = status.as_u16(), %message, "Drive request failed");

        Err(match status {
            StatusCode::UNAUTHORIZED => DriveError::Unauthorized(message),
            StatusCode::FORBIDDEN => DriveError::Forbidden(message),
            StatusCode::NOT_FOUND => DriveError::NotFound(message),
            s if s.is_server_error() => DriveError::ServerError(message),
            s => DriveError::Api {
                status: s.as_u16(),
                message,
            },
        })
    }
}
