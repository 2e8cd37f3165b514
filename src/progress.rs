//! Progress notification and cooperative cancellation for long runs.
//!
//! The engine never depends on a UI: it calls a [`ProgressSink`] once per
//! processed entry and once when the run ends. Any `FnMut(ProgressEvent)`
//! closure is a sink.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The file was moved to its destination.
    Moved,
    /// The file was moved back to its original location.
    Restored,
    /// The entry was skipped; the run continues.
    Skipped(String),
    /// The entry failed and the run stops.
    Failed(String),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed(String),
    Cancelled,
}

/// A notification emitted during execution or undo.
#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent<'a> {
    Entry {
        /// Zero-based position of the entry in the run.
        index: usize,
        total: usize,
        source_path: &'a Path,
        destination_path: &'a Path,
        /// Category of the entry; only known while executing a plan.
        category: Option<&'a str>,
        outcome: &'a EntryOutcome,
    },
    Finished(&'a RunStatus),
}

/// Receiver of progress notifications.
pub trait ProgressSink {
    fn notify(&mut self, event: ProgressEvent<'_>);
}

impl<F> ProgressSink for F
where
    F: FnMut(ProgressEvent<'_>),
{
    fn notify(&mut self, event: ProgressEvent<'_>) {
        self(event)
    }
}

/// A sink that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn notify(&mut self, _event: ProgressEvent<'_>) {}
}

/// A shared flag checked between entries; cancelling drops the remaining ones.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
