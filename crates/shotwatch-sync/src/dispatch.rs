//! Serial event loop
//!
//! Reads one event at a time and waits for its reconciliation to finish
//! before reading the next, so two events for the same file never
//! interleave. Each handler runs under a deadline; a pending shutdown is
//! honoured before the next event is taken.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::{EventOutcome, ReconciliationEngine};
use crate::watcher::EventStream;

/// Counts of event outcomes over one run of the loop
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub uploaded: u64,
    pub deleted: u64,
    pub not_indexed: u64,
    pub ignored: u64,
    /// Events that ended in any failure outcome, timeouts included
    pub failed: u64,
    pub timed_out: u64,
    /// Errors reported by the watcher itself
    pub watch_errors: u64,
}

impl DispatchSummary {
    fn record(&mut self, outcome: &EventOutcome) {
        match outcome {
            EventOutcome::Uploaded { .. } => self.uploaded += 1,
            EventOutcome::Deleted { .. } => self.deleted += 1,
            EventOutcome::NotIndexed { .. } => self.not_indexed += 1,
            EventOutcome::Ignored => self.ignored += 1,
            EventOutcome::TimedOut => {
                self.timed_out += 1;
                self.failed += 1;
            }
            _ => self.failed += 1,
        }
    }

    /// Events taken off the stream
    pub fn events(&self) -> u64 {
        self.uploaded + self.deleted + self.not_indexed + self.ignored + self.failed
    }
}

/// Consumes `stream` until shutdown is requested or the watcher goes away
///
/// Watcher errors are logged and counted; they never end the loop.
pub async fn run(
    engine: &ReconciliationEngine,
    mut stream: EventStream,
    shutdown: CancellationToken,
    handler_timeout: Duration,
) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    let mut errors_open = true;

    info!(timeout_secs = handler_timeout.as_secs(), "Event loop started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("Shutdown requested, leaving event loop");
                break;
            }

            event = stream.events.recv() => {
                let Some(event) = event else {
                    warn!("Event source closed, leaving event loop");
                    break;
                };

                let outcome = match tokio::time::timeout(handler_timeout, engine.handle(&event)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        error!(
                            path = %event.path.display(),
                            timeout_secs = handler_timeout.as_secs(),
                            "Reconciliation timed out, event abandoned"
                        );
                        EventOutcome::TimedOut
                    }
                };
                debug!(?outcome, "Event reconciled");
                summary.record(&outcome);
            }

            err = stream.errors.recv(), if errors_open => {
                match err {
                    Some(message) => {
                        warn!(error = %message, "File watcher error");
                        summary.watch_errors += 1;
                    }
                    None => errors_open = false,
                }
            }
        }
    }

    info!(
        uploaded = summary.uploaded,
        deleted = summary.deleted,
        failed = summary.failed,
        "Event loop stopped"
    );
    summary
}
