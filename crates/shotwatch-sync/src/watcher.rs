//! Filesystem event source
//!
//! Wraps the `notify` crate to monitor the watched directory (non-recursive)
//! and turns raw OS events into [`WatchEvent`] values on a bounded channel.
//! Watcher failures travel on a separate error channel so the dispatch loop
//! can log them without stopping.
//!
//! ```text
//! inotify / kqueue
//!       │
//!       ▼
//!  FileWatcher ──→ events: mpsc<WatchEvent> ──→ dispatch::run
//!              └─→ errors: mpsc<String>     ──┘
//! ```

use std::path::PathBuf;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use shotwatch_core::domain::WatchedDirectory;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::SyncError;

/// What happened to a path, as far as reconciliation cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOp {
    /// File contents were written
    Write,
    /// The file was removed
    Remove,
    /// Create, rename, metadata or access; logged and ignored
    Other,
}

/// A single filesystem notification for one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub op: WatchOp,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, op: WatchOp) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }
}

/// Receiving ends of the watcher channels
///
/// Both channels close once the owning [`FileWatcher`] is dropped.
pub struct EventStream {
    pub events: mpsc::Receiver<WatchEvent>,
    pub errors: mpsc::Receiver<String>,
}

/// Watches one directory using the OS-native mechanism
///
/// Events stop as soon as the watcher is dropped, so keep it alive for as
/// long as the [`EventStream`] is consumed.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Starts watching `dir` and returns the watcher with its event stream
    ///
    /// `buffer` bounds the event channel. The notify thread blocks when the
    /// channel is full, which pushes back on the OS queue rather than
    /// dropping events.
    ///
    /// # Errors
    /// Returns [`SyncError::Watch`] if the OS watcher cannot be created or
    /// attached to the directory
    pub fn new(dir: &WatchedDirectory, buffer: usize) -> Result<(Self, EventStream), SyncError> {
        let (event_tx, event_rx) = mpsc::channel::<WatchEvent>(buffer.max(1));
        let (error_tx, error_rx) = mpsc::channel::<String>(buffer.max(1));
        let root = dir.as_path().to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for change in map_notify_event(&event) {
                        if event_tx.blocking_send(change).is_err() {
                            debug!("Event receiver dropped, discarding notification");
                            return;
                        }
                    }
                }
                Err(err) => {
                    if error_tx.blocking_send(err.to_string()).is_err() {
                        warn!(error = %err, "File watcher error with no receiver");
                    }
                }
            },
            notify::Config::default(),
        )
        .map_err(|source| SyncError::Watch {
            path: root.clone(),
            source,
        })?;

        watcher
            .watch(&root, RecursiveMode::NonRecursive)
            .map_err(|source| SyncError::Watch {
                path: root.clone(),
                source,
            })?;

        info!(path = %root.display(), "Watching directory");

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            EventStream {
                events: event_rx,
                errors: error_rx,
            },
        ))
    }

    /// The directory being watched
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

/// Classifies a notify event kind
fn classify(kind: &EventKind) -> WatchOp {
    match kind {
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            WatchOp::Write
        }
        EventKind::Remove(_) => WatchOp::Remove,
        _ => WatchOp::Other,
    }
}

/// Converts a `notify::Event` into one [`WatchEvent`] per affected path
fn map_notify_event(event: &notify::Event) -> Vec<WatchEvent> {
    let op = classify(&event.kind);
    if op == WatchOp::Other {
        debug!(kind = ?event.kind, paths = ?event.paths, "Unhandled event kind");
    }

    event
        .paths
        .iter()
        .map(|path| WatchEvent::new(path.clone(), op))
        .collect()
}
