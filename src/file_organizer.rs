/// Execution of organization plans.
///
/// This module moves files according to a [`Plan`], creating category
/// folders as needed and recording every completed move in an
/// [`OperationRecord`] so the run can be undone. Execution is fail-fast: the
/// first move that fails stops the run, and the record holds exactly the
/// moves that completed before it.
use crate::journal::{MoveRecord, OperationRecord};
use crate::planner::{Plan, PlanEntry};
use crate::progress::{CancelToken, EntryOutcome, ProgressEvent, ProgressSink, RunStatus};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A move that stopped an execution.
#[derive(Debug, Error)]
#[error("failed to move {} to {}: {reason}", source_path.display(), destination_path.display())]
pub struct MoveFailure {
    /// Zero-based index of the failed entry in the plan.
    pub index: usize,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    #[source]
    pub reason: io::Error,
}

/// How an execution ended.
#[derive(Debug)]
pub enum ExecutionStatus {
    Completed,
    Failed(MoveFailure),
    /// Cancelled between entries; `remaining` entries were not attempted.
    Cancelled { remaining: usize },
}

/// The outcome of executing a plan.
#[derive(Debug)]
pub struct ExecutionReport {
    /// Moves that completed, in completion order.
    pub record: OperationRecord,
    pub status: ExecutionStatus,
}

impl ExecutionReport {
    pub fn moved(&self) -> usize {
        self.record.entries.len()
    }

    pub fn is_complete_success(&self) -> bool {
        matches!(self.status, ExecutionStatus::Completed)
    }

    pub fn failure(&self) -> Option<&MoveFailure> {
        match &self.status {
            ExecutionStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Performs planned moves on the filesystem.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Executes `plan` in order, stopping at the first failed move.
    ///
    /// The returned record is never discarded on failure: it holds the moves
    /// that completed so they can be journaled and undone.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidyfold::file_category::CategorySet;
    /// use tidyfold::file_organizer::FileOrganizer;
    /// use tidyfold::planner::build_plan;
    /// use tidyfold::progress::{CancelToken, NoProgress};
    /// use std::path::Path;
    ///
    /// let categories = CategorySet::defaults();
    /// let plan = build_plan(Path::new("/path/to/downloads"), &categories, None).unwrap();
    /// let report = FileOrganizer::execute(&plan, &mut NoProgress, &CancelToken::new());
    /// println!("moved {} files", report.moved());
    /// ```
    pub fn execute(
        plan: &Plan,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> ExecutionReport {
        let mut record = OperationRecord::new(&plan.root);
        let total = plan.entries.len();

        for (index, entry) in plan.entries.iter().enumerate() {
            if cancel.is_cancelled() {
                let remaining = total - index;
                tracing::info!(remaining, "execution cancelled");
                progress.notify(ProgressEvent::Finished(&RunStatus::Cancelled));
                return ExecutionReport {
                    record,
                    status: ExecutionStatus::Cancelled { remaining },
                };
            }

            match Self::move_entry(entry, &mut record.created_directories) {
                Ok(()) => {
                    tracing::debug!(
                        source = %entry.source_path.display(),
                        destination = %entry.destination_path.display(),
                        "moved"
                    );
                    record.entries.push(MoveRecord {
                        source_path: entry.source_path.clone(),
                        destination_path: entry.destination_path.clone(),
                    });
                    Self::notify_entry(progress, index, total, entry, &EntryOutcome::Moved);
                }
                Err(reason) => {
                    let failure = MoveFailure {
                        index,
                        source_path: entry.source_path.clone(),
                        destination_path: entry.destination_path.clone(),
                        reason,
                    };
                    tracing::warn!(error = %failure, completed = record.entries.len(), "execution stopped");
                    let message = failure.to_string();
                    Self::notify_entry(
                        progress,
                        index,
                        total,
                        entry,
                        &EntryOutcome::Failed(message.clone()),
                    );
                    progress.notify(ProgressEvent::Finished(&RunStatus::Failed(message)));
                    return ExecutionReport {
                        record,
                        status: ExecutionStatus::Failed(failure),
                    };
                }
            }
        }

        tracing::info!(moved = record.entries.len(), "execution completed");
        progress.notify(ProgressEvent::Finished(&RunStatus::Completed));
        ExecutionReport {
            record,
            status: ExecutionStatus::Completed,
        }
    }

    /// Moves one file, creating its category folder if needed.
    ///
    /// Refuses to overwrite: a destination that appeared after planning is an
    /// error. A folder created for a move that then fails is removed again.
    fn move_entry(entry: &PlanEntry, created_dirs: &mut Vec<PathBuf>) -> io::Result<()> {
        if !entry.source_path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "source file no longer exists",
            ));
        }
        if fs::symlink_metadata(&entry.destination_path).is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "destination already exists",
            ));
        }

        let created = match entry.destination_path.parent() {
            Some(parent) => Self::ensure_dir(parent, created_dirs)?,
            None => false,
        };

        fs::rename(&entry.source_path, &entry.destination_path).inspect_err(|_| {
            if created && let Some(dir) = created_dirs.pop() {
                Self::remove_if_empty(&dir);
            }
        })
    }

    /// Creates `dir` when it is missing; returns whether it was created.
    fn ensure_dir(dir: &Path, created_dirs: &mut Vec<PathBuf>) -> io::Result<bool> {
        if dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(dir)?;
        created_dirs.push(dir.to_path_buf());
        Ok(true)
    }

    fn remove_if_empty(dir: &Path) {
        if let Err(e) = fs::remove_dir(dir) {
            tracing::warn!(path = %dir.display(), error = %e, "could not remove created directory");
        }
    }

    fn notify_entry(
        progress: &mut dyn ProgressSink,
        index: usize,
        total: usize,
        entry: &PlanEntry,
        outcome: &EntryOutcome,
    ) {
        progress.notify(ProgressEvent::Entry {
            index,
            total,
            source_path: &entry.source_path,
            destination_path: &entry.destination_path,
            category: Some(&entry.category),
            outcome,
        });
    }
}
