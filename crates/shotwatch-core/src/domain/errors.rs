//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and watched-directory path errors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid email address format
    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Event path does not lie under the watched directory
    #[error("Path not within watched directory: {0}")]
    PathNotInWatchedDirectory(String),

    /// Invalid remote object or container ID
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Invalid remote permission ID
    #[error("Invalid permission ID: {0}")]
    InvalidPermissionId(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
