/// Undo functionality for reverting organize runs.
///
/// This module moves files back to their original locations based on an
/// [`OperationRecord`]. Entries are replayed newest first; an entry that
/// cannot be restored is skipped with a reason and the replay continues.
use crate::journal::{MoveRecord, OperationRecord};
use crate::progress::{CancelToken, EntryOutcome, ProgressEvent, ProgressSink, RunStatus};
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// Why a recorded move could not be reverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoSkipReason {
    /// The moved file is no longer at its destination.
    MissingFile,
    /// Something now occupies the original location.
    DestinationOccupied,
    /// The rename back failed.
    MoveFailed(String),
}

impl fmt::Display for UndoSkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndoSkipReason::MissingFile => write!(f, "file not found at its recorded destination"),
            UndoSkipReason::DestinationOccupied => {
                write!(f, "original location is occupied")
            }
            UndoSkipReason::MoveFailed(reason) => write!(f, "move failed: {}", reason),
        }
    }
}

/// Represents the result of an undo operation.
#[derive(Debug)]
pub struct UndoReport {
    pub operation_id: String,
    /// Entries moved back, in replay order.
    pub restored: Vec<MoveRecord>,
    /// Entries left where they are, in replay order.
    pub skipped: Vec<(MoveRecord, UndoSkipReason)>,
    /// Category folders removed because the undo emptied them.
    pub removed_directories: Vec<PathBuf>,
    /// Set when the replay stopped on a cancel request.
    pub cancelled: bool,
}

impl UndoReport {
    fn new(operation_id: &str) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            restored: Vec::new(),
            skipped: Vec::new(),
            removed_directories: Vec::new(),
            cancelled: false,
        }
    }

    /// Returns true if every recorded move was reverted.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.skipped.is_empty()
    }
}

/// Manages undo operations for organize runs.
pub struct UndoManager;

impl UndoManager {
    /// Reverts the moves of `record`, newest first.
    ///
    /// # Edge Cases Handled
    ///
    /// * **File not found**: skipped as [`UndoSkipReason::MissingFile`]
    /// * **Already moved back**: counted as restored
    /// * **Original location taken**: skipped as [`UndoSkipReason::DestinationOccupied`]; nothing is overwritten
    /// * **Rename error**: skipped as [`UndoSkipReason::MoveFailed`]
    ///
    /// When every entry is restored, the category folders the run created are
    /// removed if they are empty.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidyfold::journal::OperationLog;
    /// use tidyfold::progress::{CancelToken, NoProgress};
    /// use tidyfold::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// let log = OperationLog::load(Path::new("history.json")).unwrap();
    /// if let Some(record) = log.latest() {
    ///     let report = UndoManager::undo(record, &mut NoProgress, &CancelToken::new());
    ///     println!("Restored {} files", report.restored.len());
    /// }
    /// ```
    pub fn undo(
        record: &OperationRecord,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> UndoReport {
        let mut report = UndoReport::new(&record.operation_id);
        let total = record.entries.len();

        for (index, entry) in record.entries.iter().rev().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!(remaining = total - index, "undo cancelled");
                report.cancelled = true;
                progress.notify(ProgressEvent::Finished(&RunStatus::Cancelled));
                return report;
            }

            let outcome = match Self::restore_file(entry) {
                Ok(()) => {
                    tracing::debug!(
                        source = %entry.destination_path.display(),
                        destination = %entry.source_path.display(),
                        "restored"
                    );
                    report.restored.push(entry.clone());
                    EntryOutcome::Restored
                }
                Err(reason) => {
                    tracing::warn!(
                        path = %entry.destination_path.display(),
                        reason = %reason,
                        "undo skipped entry"
                    );
                    let outcome = EntryOutcome::Skipped(reason.to_string());
                    report.skipped.push((entry.clone(), reason));
                    outcome
                }
            };

            progress.notify(ProgressEvent::Entry {
                index,
                total,
                source_path: &entry.destination_path,
                destination_path: &entry.source_path,
                category: None,
                outcome: &outcome,
            });
        }

        if report.is_complete() {
            report.removed_directories = Self::remove_empty_directories(record);
        }

        tracing::info!(
            operation_id = %record.operation_id,
            restored = report.restored.len(),
            skipped = report.skipped.len(),
            "undo finished"
        );
        progress.notify(ProgressEvent::Finished(&RunStatus::Completed));
        report
    }

    /// Moves one file back to where it came from.
    ///
    /// An entry whose file is already back at its source, with nothing left at
    /// the destination, counts as restored so a retried undo can finish.
    fn restore_file(entry: &MoveRecord) -> Result<(), UndoSkipReason> {
        if !entry.destination_path.is_file() {
            if fs::symlink_metadata(&entry.destination_path).is_err()
                && entry.source_path.is_file()
            {
                tracing::debug!(path = %entry.source_path.display(), "already restored");
                return Ok(());
            }
            return Err(UndoSkipReason::MissingFile);
        }
        if fs::symlink_metadata(&entry.source_path).is_ok() {
            return Err(UndoSkipReason::DestinationOccupied);
        }
        if let Some(parent) = entry.source_path.parent()
            && !parent.is_dir()
        {
            fs::create_dir_all(parent).map_err(|e| UndoSkipReason::MoveFailed(e.to_string()))?;
        }
        fs::rename(&entry.destination_path, &entry.source_path)
            .map_err(|e| UndoSkipReason::MoveFailed(e.to_string()))
    }

    fn remove_empty_directories(record: &OperationRecord) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        for dir in record.created_directories.iter().rev() {
            let is_empty = fs::read_dir(dir)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if !is_empty {
                continue;
            }
            match fs::remove_dir(dir) {
                Ok(()) => removed.push(dir.clone()),
                Err(e) => tracing::warn!(
                    path = %dir.display(),
                    error = %e,
                    "could not remove created directory"
                ),
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_category::{Category, CategorySet};
    use crate::file_organizer::FileOrganizer;
    use crate::planner::build_plan;
    use crate::progress::NoProgress;
    use std::path::Path;
    use tempfile::TempDir;

    fn organize(root: &Path) -> OperationRecord {
        let categories = CategorySet::new(vec![
            Category::new("Images", [".png"]).unwrap(),
            Category::new("Docs", [".pdf"]).unwrap(),
        ])
        .unwrap();
        let plan = build_plan(root, &categories, None).unwrap();
        FileOrganizer::execute(&plan, &mut NoProgress, &CancelToken::new()).record
    }

    #[test]
    fn test_undo_restores_files_and_removes_created_folders() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.png"), "a").unwrap();
        fs::write(root.join("b.pdf"), "b").unwrap();
        fs::write(root.join("c.txt"), "c").unwrap();

        let record = organize(root);
        assert!(root.join("Uncategorized/c.txt").exists());

        let report = UndoManager::undo(&record, &mut NoProgress, &CancelToken::new());

        assert!(report.is_complete());
        assert_eq!(report.restored.len(), 3);
        assert!(root.join("a.png").exists());
        assert!(root.join("b.pdf").exists());
        assert!(root.join("c.txt").exists());
        assert!(!root.join("Images").exists());
        assert!(!root.join("Docs").exists());
        assert!(!root.join("Uncategorized").exists());
        assert_eq!(report.removed_directories.len(), 3);
    }

    #[test]
    fn test_undo_replays_in_reverse_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.pdf"), "a").unwrap();
        fs::write(root.join("b.pdf"), "b").unwrap();

        let record = organize(root);
        let report = UndoManager::undo(&record, &mut NoProgress, &CancelToken::new());

        let order: Vec<_> = report.restored.iter().map(|m| m.source_path.clone()).collect();
        assert_eq!(order, vec![root.join("b.pdf"), root.join("a.pdf")]);
    }

    #[test]
    fn test_undo_skips_missing_and_occupied() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.pdf"), "a").unwrap();
        fs::write(root.join("b.pdf"), "b").unwrap();
        fs::write(root.join("c.png"), "c").unwrap();

        let record = organize(root);
        fs::remove_file(root.join("Docs/a.pdf")).unwrap();
        fs::write(root.join("b.pdf"), "newcomer").unwrap();

        let report = UndoManager::undo(&record, &mut NoProgress, &CancelToken::new());

        assert!(!report.is_complete());
        assert_eq!(report.restored.len(), 1);
        assert!(root.join("c.png").exists());
        let reasons: Vec<_> = report
            .skipped
            .iter()
            .map(|(entry, reason)| (entry.source_path.clone(), reason.clone()))
            .collect();
        assert!(reasons.contains(&(root.join("a.pdf"), UndoSkipReason::MissingFile)));
        assert!(reasons.contains(&(root.join("b.pdf"), UndoSkipReason::DestinationOccupied)));
        // The occupant is untouched and the moved copy stays put.
        assert_eq!(fs::read_to_string(root.join("b.pdf")).unwrap(), "newcomer");
        assert!(root.join("Docs/b.pdf").exists());
        // Folders are kept when the undo is incomplete.
        assert!(report.removed_directories.is_empty());
        assert!(root.join("Images").exists());
    }

    #[test]
    fn test_retried_undo_completes_after_blocker_removed() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.png"), "a").unwrap();
        fs::write(root.join("b.png"), "b").unwrap();

        let record = organize(root);
        fs::write(root.join("a.png"), "blocker").unwrap();

        let first = UndoManager::undo(&record, &mut NoProgress, &CancelToken::new());
        assert!(!first.is_complete());
        assert_eq!(first.restored.len(), 1);
        assert!(root.join("b.png").exists());

        fs::remove_file(root.join("a.png")).unwrap();
        let retry = UndoManager::undo(&record, &mut NoProgress, &CancelToken::new());

        assert!(retry.is_complete(), "skipped: {:?}", retry.skipped);
        assert_eq!(retry.restored.len(), 2);
        assert_eq!(fs::read_to_string(root.join("a.png")).unwrap(), "a");
        assert_eq!(fs::read_to_string(root.join("b.png")).unwrap(), "b");
        assert!(!root.join("Images").exists());
    }

    #[test]
    fn test_undo_keeps_non_empty_created_folder() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.pdf"), "a").unwrap();

        let record = organize(root);
        fs::write(root.join("Docs/notes.txt"), "mine").unwrap();

        let report = UndoManager::undo(&record, &mut NoProgress, &CancelToken::new());

        assert!(report.is_complete());
        assert!(root.join("a.pdf").exists());
        assert!(root.join("Docs/notes.txt").exists());
        assert!(report.removed_directories.is_empty());
    }

    #[test]
    fn test_undo_cancelled_is_incomplete() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.pdf"), "a").unwrap();

        let record = organize(root);
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = UndoManager::undo(&record, &mut NoProgress, &cancel);

        assert!(report.cancelled);
        assert!(!report.is_complete());
        assert!(report.restored.is_empty());
        assert!(root.join("Docs/a.pdf").exists());
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(
            UndoSkipReason::MoveFailed("permission denied".to_string()).to_string(),
            "move failed: permission denied"
        );
    }
}
