//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. The reconciliation engine depends on them; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Container lookup and creation, object upload and
//!   deletion, access grants
//! - [`IRecordIndex`] - Transaction-scoped access to file records and
//!   permission grants

pub mod record_index;
pub mod remote_store;

pub use record_index::{IIndexTransaction, IRecordIndex};
pub use remote_store::{AccessEntry, AccessRole, IRemoteStore, RemoteStoreError, Tokens};
