//! Shotwatch Sync - Reconciliation engine
//!
//! Keeps the watched directory, the remote store and the record index
//! consistent as screenshots appear and disappear on disk.
//!
//! ## Modules
//!
//! - [`watcher`] - Filesystem event source built on `notify`
//! - [`bootstrap`] - One-time root folder and access reconciliation
//! - [`engine`] - Per-event upload and delete reconciliation
//! - [`dispatch`] - Serial event loop with per-event deadline and shutdown

pub mod bootstrap;
pub mod dispatch;
pub mod engine;
pub mod watcher;

use std::path::PathBuf;

use thiserror::Error;

pub use bootstrap::{bootstrap, BootstrapError, BootstrapReport};
pub use dispatch::{run, DispatchSummary};
pub use engine::{EngineSettings, EventOutcome, ReconciliationEngine};
pub use watcher::{EventStream, FileWatcher, WatchEvent, WatchOp};

/// Errors raised while setting up the event source
#[derive(Debug, Error)]
pub enum SyncError {
    /// The OS watcher could not be created or attached
    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}
