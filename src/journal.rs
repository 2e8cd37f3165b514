/// The persisted history of executed organize runs.
///
/// Each executed plan becomes one immutable [`OperationRecord`]. The
/// [`OperationLog`] keeps records in execution order and writes itself to
/// disk after every append or removal, so a crash loses at most the run that
/// was in flight.
use crate::store::{self, STORE_VERSION, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One completed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
}

/// The journal entry for one organize run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation_id: String,
    pub timestamp: DateTime<Utc>,
    /// Directory the run organized.
    pub root: PathBuf,
    /// Completed moves in completion order.
    pub entries: Vec<MoveRecord>,
    /// Category folders created by the run.
    #[serde(default)]
    pub created_directories: Vec<PathBuf>,
}

impl OperationRecord {
    /// Starts an empty record with a fresh id.
    pub fn new(root: &Path) -> Self {
        Self {
            operation_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            root: root.to_path_buf(),
            entries: Vec::new(),
            created_directories: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct LogFile {
    version: u32,
    records: Vec<OperationRecord>,
}

/// Ordered history of operation records, optionally backed by a file.
#[derive(Debug, Default)]
pub struct OperationLog {
    records: Vec<OperationRecord>,
    path: Option<PathBuf>,
    limit: Option<usize>,
}

impl OperationLog {
    /// A log that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the log stored at `path`; a missing file is an empty log.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let records = store::read_json::<LogFile>(path)?
            .map(|file| file.records)
            .unwrap_or_default();
        tracing::debug!(path = %path.display(), records = records.len(), "operation log loaded");
        Ok(Self {
            records,
            path: Some(path.to_path_buf()),
            limit: None,
        })
    }

    /// Keeps at most `limit` records; older ones are dropped on the next append.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit.filter(|&n| n > 0);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Records oldest first.
    pub fn records(&self) -> &[OperationRecord] {
        &self.records
    }

    pub fn get(&self, operation_id: &str) -> Option<&OperationRecord> {
        self.records.iter().find(|r| r.operation_id == operation_id)
    }

    pub fn latest(&self) -> Option<&OperationRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends a record and saves the log.
    pub fn append(&mut self, record: OperationRecord) -> Result<(), StoreError> {
        self.records.push(record);
        if let Some(limit) = self.limit
            && self.records.len() > limit
        {
            let excess = self.records.len() - limit;
            for dropped in self.records.drain(..excess) {
                tracing::warn!(
                    operation_id = %dropped.operation_id,
                    "history limit reached, dropping oldest operation"
                );
            }
        }
        self.save()
    }

    /// Removes a record by id and saves the log.
    ///
    /// Returns the removed record, or `None` if no record has this id.
    pub fn remove(&mut self, operation_id: &str) -> Result<Option<OperationRecord>, StoreError> {
        let Some(pos) = self
            .records
            .iter()
            .position(|r| r.operation_id == operation_id)
        else {
            return Ok(None);
        };
        let removed = self.records.remove(pos);
        self.save()?;
        Ok(Some(removed))
    }

    /// Writes the log to its backing file, if any.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = LogFile {
            version: STORE_VERSION,
            records: self.records.clone(),
        };
        store::write_json(path, &file)
    }
}
