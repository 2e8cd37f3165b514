//! The organization engine.
//!
//! [`OrganizationEngine`] owns the category set, the persisted stores and the
//! operation log. Planning only reads the filesystem; executing and undoing
//! change it and are serialized on the log's mutex for their full duration.

use crate::file_category::{CategoryError, CategorySet, ExtensionConflict};
use crate::file_organizer::{ExecutionReport, FileOrganizer};
use crate::filter::FilterSpec;
use crate::journal::{OperationLog, OperationRecord};
use crate::metadata::FsMetadataReader;
use crate::planner::{Plan, PlanBuilder, PlanError};
use crate::progress::{CancelToken, ProgressSink};
use crate::stats::StatsSummary;
use crate::store::{CategoryStore, StoreError};
use crate::undo::{UndoManager, UndoReport};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no recorded operation with id '{0}'")]
    UnknownOperation(String),
    #[error("there is no operation to undo")]
    NothingToUndo,
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where the engine keeps its state. `None` paths keep that state in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSettings {
    pub categories_file: Option<PathBuf>,
    pub history_file: Option<PathBuf>,
    pub history_limit: Option<usize>,
    pub sniff_missing_extensions: bool,
}

/// An execution together with the fate of its journal entry.
#[derive(Debug)]
pub struct ExecuteOutcome {
    pub report: ExecutionReport,
    /// Whether the record was added to the log (records without moves are not).
    pub journaled: bool,
    /// Set when the record could not be written to disk; it is still kept in memory.
    pub persist_error: Option<StoreError>,
}

/// An undo together with the fate of its journal entry.
#[derive(Debug)]
pub struct UndoOutcome {
    pub report: UndoReport,
    /// Whether the record was dropped from the log.
    pub forgotten: bool,
    pub persist_error: Option<StoreError>,
}

#[derive(Debug)]
pub struct OrganizationEngine {
    categories: CategorySet,
    category_store: Option<CategoryStore>,
    journal: Mutex<OperationLog>,
    reader: FsMetadataReader,
}

impl OrganizationEngine {
    /// Opens the engine, loading both stores.
    ///
    /// Missing store files are not an error: categories fall back to the
    /// defaults and the history starts empty.
    pub fn open(settings: &EngineSettings) -> Result<Self, EngineError> {
        let category_store = settings.categories_file.as_deref().map(CategoryStore::new);
        let categories = match &category_store {
            Some(store) => store.load()?,
            None => CategorySet::defaults(),
        };
        let journal = match &settings.history_file {
            Some(path) => OperationLog::load(path)?,
            None => OperationLog::in_memory(),
        }
        .with_limit(settings.history_limit);

        tracing::debug!(
            categories = categories.len(),
            operations = journal.len(),
            "engine opened"
        );
        Ok(Self {
            categories,
            category_store,
            journal: Mutex::new(journal),
            reader: FsMetadataReader::new().with_content_sniffing(settings.sniff_missing_extensions),
        })
    }

    /// An engine that persists nothing.
    pub fn in_memory(categories: CategorySet) -> Self {
        Self {
            categories,
            category_store: None,
            journal: Mutex::new(OperationLog::in_memory()),
            reader: FsMetadataReader::new(),
        }
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    /// Extensions claimed by more than one category, with the winning category.
    pub fn conflicts(&self) -> &[ExtensionConflict] {
        self.categories.conflicts()
    }

    pub fn add_category(
        &mut self,
        name: &str,
        extensions: &[String],
    ) -> Result<Vec<ExtensionConflict>, EngineError> {
        self.mutate_categories(|set| set.add_category(name, extensions))
    }

    pub fn update_category(
        &mut self,
        name: &str,
        extensions: &[String],
    ) -> Result<Vec<ExtensionConflict>, EngineError> {
        self.mutate_categories(|set| set.update_category(name, extensions))
    }

    pub fn remove_category(&mut self, name: &str) -> Result<(), EngineError> {
        self.mutate_categories(|set| set.remove_category(name).map(|_| ()))
    }

    pub fn reset_categories(&mut self) -> Result<(), EngineError> {
        self.mutate_categories(|set| {
            set.reset_to_defaults();
            Ok(())
        })
    }

    /// Applies a change to a copy of the categories, saves it, then commits it.
    fn mutate_categories<T>(
        &mut self,
        change: impl FnOnce(&mut CategorySet) -> Result<T, CategoryError>,
    ) -> Result<T, EngineError> {
        let mut updated = self.categories.clone();
        let result = change(&mut updated)?;
        if let Some(store) = &self.category_store {
            store.save(&updated)?;
        }
        self.categories = updated;
        Ok(result)
    }

    /// Plans the reorganization of `root` without touching the filesystem.
    pub fn build_plan(&self, root: &Path, filter: Option<&FilterSpec>) -> Result<Plan, PlanError> {
        PlanBuilder::new(&self.categories)
            .with_filter(filter)
            .with_reader(self.reader)
            .build(root)
    }

    /// Per-category statistics of `root`, counting files both still to move
    /// and already in their category folder.
    pub fn summarize_directory(
        &self,
        root: &Path,
        filter: Option<&FilterSpec>,
    ) -> Result<StatsSummary, PlanError> {
        self.build_plan(root, filter).map(|plan| plan.stats)
    }

    /// Executes `plan` and journals whatever moves completed.
    pub fn execute(
        &self,
        plan: &Plan,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> ExecuteOutcome {
        let mut journal = self.lock_journal();
        let report = FileOrganizer::execute(plan, progress, cancel);

        if report.record.is_empty() && report.record.created_directories.is_empty() {
            return ExecuteOutcome {
                report,
                journaled: false,
                persist_error: None,
            };
        }

        let persist_error = journal.append(report.record.clone()).err();
        if let Some(e) = &persist_error {
            tracing::warn!(error = %e, "operation could not be saved to history");
        }
        ExecuteOutcome {
            report,
            journaled: true,
            persist_error,
        }
    }

    /// Reverts the operation `operation_id`.
    ///
    /// The record leaves the log only when every move was reverted, so a
    /// partial undo can be retried.
    pub fn undo(
        &self,
        operation_id: &str,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<UndoOutcome, EngineError> {
        let mut journal = self.lock_journal();
        let record = journal
            .get(operation_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownOperation(operation_id.to_string()))?;
        Ok(Self::undo_record(&mut journal, &record, progress, cancel))
    }

    /// Reverts the most recent operation.
    pub fn undo_latest(
        &self,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<UndoOutcome, EngineError> {
        let mut journal = self.lock_journal();
        let record = journal.latest().cloned().ok_or(EngineError::NothingToUndo)?;
        Ok(Self::undo_record(&mut journal, &record, progress, cancel))
    }

    fn undo_record(
        journal: &mut OperationLog,
        record: &OperationRecord,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> UndoOutcome {
        let report = UndoManager::undo(record, progress, cancel);
        if !report.is_complete() {
            return UndoOutcome {
                report,
                forgotten: false,
                persist_error: None,
            };
        }

        let persist_error = journal.remove(&record.operation_id).err();
        if let Some(e) = &persist_error {
            tracing::warn!(error = %e, "history could not be saved after undo");
        }
        UndoOutcome {
            report,
            forgotten: true,
            persist_error,
        }
    }

    /// Recorded operations, oldest first.
    pub fn history(&self) -> Vec<OperationRecord> {
        self.lock_journal().records().to_vec()
    }

    fn lock_journal(&self) -> MutexGuard<'_, OperationLog> {
        self.journal.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("operation log lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_category::Category;
    use crate::progress::NoProgress;
    use std::fs;
    use tempfile::TempDir;

    fn settings(dir: &Path) -> EngineSettings {
        EngineSettings {
            categories_file: Some(dir.join("state").join("categories.json")),
            history_file: Some(dir.join("state").join("history.json")),
            ..Default::default()
        }
    }

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_engine_is_sync() {
        fn assert_sync<T: Sync + Send>() {}
        assert_sync::<OrganizationEngine>();
    }

    #[test]
    fn test_category_changes_persist_across_reopen() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let settings = settings(temp_dir.path());

        let mut engine = OrganizationEngine::open(&settings).expect("open failed");
        let conflicts = engine.add_category("Scans", &exts(&[".pdf"])).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].winner, "Scans");
        engine.remove_category("Audio").unwrap();
        drop(engine);

        let engine = OrganizationEngine::open(&settings).expect("reopen failed");
        assert_eq!(engine.categories().resolve_category(".pdf"), "Scans");
        assert!(!engine.categories().contains("Audio"));
        assert_eq!(engine.conflicts().len(), 1);
    }

    #[test]
    fn test_failed_category_change_leaves_state_untouched() {
        let mut engine = OrganizationEngine::in_memory(CategorySet::defaults());
        let before = engine.categories().len();

        let result = engine.add_category("Images", &exts(&[".heic"]));
        assert!(matches!(
            result,
            Err(EngineError::Category(CategoryError::DuplicateCategory(_)))
        ));
        assert_eq!(engine.categories().len(), before);
        assert!(matches!(
            engine.remove_category("Nope"),
            Err(EngineError::Category(CategoryError::NotFound(_)))
        ));
    }

    #[test]
    fn test_reset_categories() {
        let categories =
            CategorySet::new(vec![Category::new("Only", [".x"]).unwrap()]).unwrap();
        let mut engine = OrganizationEngine::in_memory(categories);
        engine.reset_categories().unwrap();
        assert_eq!(engine.categories().resolve_category(".png"), "Images");
        assert!(!engine.categories().contains("Only"));
    }

    #[test]
    fn test_execute_journals_and_undo_forgets() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let work = temp_dir.path().join("work");
        fs::create_dir(&work).unwrap();
        fs::write(work.join("a.png"), "a").unwrap();
        let settings = settings(temp_dir.path());

        let engine = OrganizationEngine::open(&settings).expect("open failed");
        let plan = engine.build_plan(&work, None).unwrap();
        let outcome = engine.execute(&plan, &mut NoProgress, &CancelToken::new());
        assert!(outcome.journaled);
        assert!(outcome.persist_error.is_none());
        let id = outcome.report.record.operation_id.clone();
        drop(engine);

        let engine = OrganizationEngine::open(&settings).expect("reopen failed");
        assert_eq!(engine.history().len(), 1);
        let undo = engine
            .undo(&id, &mut NoProgress, &CancelToken::new())
            .expect("undo failed");
        assert!(undo.forgotten);
        assert!(work.join("a.png").exists());
        assert!(engine.history().is_empty());

        let reopened = OrganizationEngine::open(&settings).expect("reopen failed");
        assert!(reopened.history().is_empty());
    }

    #[test]
    fn test_empty_execution_is_not_journaled() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let engine = OrganizationEngine::in_memory(CategorySet::defaults());

        let plan = engine.build_plan(temp_dir.path(), None).unwrap();
        let outcome = engine.execute(&plan, &mut NoProgress, &CancelToken::new());
        assert!(!outcome.journaled);
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_undo_unknown_and_empty_history() {
        let engine = OrganizationEngine::in_memory(CategorySet::defaults());
        assert!(matches!(
            engine.undo("missing", &mut NoProgress, &CancelToken::new()),
            Err(EngineError::UnknownOperation(id)) if id == "missing"
        ));
        assert!(matches!(
            engine.undo_latest(&mut NoProgress, &CancelToken::new()),
            Err(EngineError::NothingToUndo)
        ));
    }

    #[test]
    fn test_incomplete_undo_keeps_record() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.png"), "a").unwrap();
        fs::write(root.join("b.png"), "b").unwrap();

        let engine = OrganizationEngine::in_memory(CategorySet::defaults());
        let plan = engine.build_plan(root, None).unwrap();
        engine.execute(&plan, &mut NoProgress, &CancelToken::new());
        fs::remove_file(root.join("Images/a.png")).unwrap();

        let undo = engine
            .undo_latest(&mut NoProgress, &CancelToken::new())
            .expect("undo failed");
        assert!(!undo.forgotten);
        assert_eq!(undo.report.restored.len(), 1);
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn test_summarize_directory_counts_in_place_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir(root.join("Images")).unwrap();
        fs::write(root.join("Images/old.png"), "1234").unwrap();
        fs::write(root.join("new.png"), "12").unwrap();
        fs::write(root.join("doc.pdf"), "1").unwrap();

        let engine = OrganizationEngine::in_memory(CategorySet::defaults());
        let stats = engine.summarize_directory(root, None).unwrap();
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_bytes, 7);
        assert_eq!(stats.get("Images").map(|s| s.count), Some(2));
        assert_eq!(stats.get("Documents").map(|s| s.count), Some(1));
    }
}
