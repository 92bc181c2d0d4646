//! Domain entities and business logic
//!
//! This module contains the core domain types for Shotwatch:
//! - Newtypes for remote identifiers, index row ids and email addresses
//! - Index records (`FileRecord`, `PermissionGrant`)
//! - The watched directory and filename derivation
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod records;
pub mod watched;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::*;
pub use records::{FileRecord, PermissionGrant};
pub use watched::WatchedDirectory;
