//! Shotwatch Drive - Google Drive v3 remote store adapter
//!
//! Provides async client for:
//! - OAuth2 authentication (Authorization Code with PKCE, refresh tokens)
//! - Folder lookup and creation
//! - Multipart object upload and guarded deletion
//! - Folder permission grant, listing and revocation
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 login flow, keyring storage and token refresh
//! - [`client`] - Authenticated HTTP client with throttling retries
//! - [`retry`] - `Retry-After` parsing
//! - [`store`] - `IRemoteStore` implementation over the Drive REST API

pub mod auth;
pub mod client;
pub mod retry;
pub mod store;

use std::time::Duration;
use thiserror::Error;

pub use client::DriveClient;
pub use store::DriveRemoteStore;

/// Errors that can occur when communicating with the Google Drive API
#[derive(Debug, Error)]
pub enum DriveError {
    /// Authentication credentials are invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Throttled and out of retries
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration the server last asked us to wait
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Any other non-success status
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message extracted from the error body
        message: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Reading the local file to upload failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
