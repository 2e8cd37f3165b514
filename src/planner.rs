/// Dry-run planning of a directory reorganization.
///
/// The planner scans the immediate files of a root directory, filters and
/// categorizes them, and computes conflict-free destinations inside
/// `root/<category>/`. Nothing on disk is modified; the resulting [`Plan`]
/// can be previewed, summarized, or handed to
/// [`FileOrganizer::execute`](crate::file_organizer::FileOrganizer::execute).
use crate::file_category::{CategorySet, UNCATEGORIZED};
use crate::filter::FilterSpec;
use crate::metadata::{FileRecord, FsMetadataReader, MetadataReader};
use crate::stats::{StatsSummary, summarize};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on the ` (n)` suffix tried for a single file.
pub const MAX_NAME_SUFFIX: u32 = 10_000;

/// Errors that abort planning entirely.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("cannot read directory {}: {source}", path.display())]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One planned move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub category: String,
    pub size_bytes: u64,
}

impl PlanEntry {
    /// Whether the destination name differs from the source name.
    pub fn is_renamed(&self) -> bool {
        self.source_path.file_name() != self.destination_path.file_name()
    }
}

/// Why a scanned file is not part of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The file did not match the filter.
    FilteredOut,
    /// The file's metadata could not be read.
    Unreadable(String),
    /// `root/<category>` exists but is not a directory.
    DestinationBlocked(PathBuf),
    /// Every suffixed name up to [`MAX_NAME_SUFFIX`] is taken.
    NoFreeName,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FilteredOut => write!(f, "filtered-out"),
            SkipReason::Unreadable(reason) => write!(f, "unreadable: {}", reason),
            SkipReason::DestinationBlocked(path) => {
                write!(f, "destination-blocked: {} is not a directory", path.display())
            }
            SkipReason::NoFreeName => write!(f, "no-free-name"),
        }
    }
}

/// A scanned file left out of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// A file already sitting in its category folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InPlaceFile {
    pub path: PathBuf,
    pub category: String,
    pub size_bytes: u64,
}

/// The result of planning a directory.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub root: PathBuf,
    /// Moves in scan order.
    pub entries: Vec<PlanEntry>,
    pub skipped: Vec<SkippedFile>,
    pub in_place: Vec<InPlaceFile>,
    /// Statistics over `entries` and `in_place`.
    pub stats: StatsSummary,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of entries whose destination received a ` (n)` suffix.
    pub fn renamed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_renamed()).count()
    }
}

/// Builds plans against a category set, an optional filter and a metadata source.
pub struct PlanBuilder<'a, R: MetadataReader = FsMetadataReader> {
    categories: &'a CategorySet,
    filter: Option<&'a FilterSpec>,
    reader: R,
}

impl<'a> PlanBuilder<'a, FsMetadataReader> {
    pub fn new(categories: &'a CategorySet) -> Self {
        Self {
            categories,
            filter: None,
            reader: FsMetadataReader::new(),
        }
    }
}

impl<'a, R: MetadataReader> PlanBuilder<'a, R> {
    pub fn with_filter(mut self, filter: Option<&'a FilterSpec>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_reader<R2: MetadataReader>(self, reader: R2) -> PlanBuilder<'a, R2> {
        PlanBuilder {
            categories: self.categories,
            filter: self.filter,
            reader,
        }
    }

    /// Scans `root` and computes the plan.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::DirectoryAccess`] if `root` cannot be listed.
    /// Problems with individual files are reported in [`Plan::skipped`].
    pub fn build(&self, root: &Path) -> Result<Plan, PlanError> {
        let files = list_files(root).map_err(|source| PlanError::DirectoryAccess {
            path: root.to_path_buf(),
            source,
        })?;

        let mut plan = Plan {
            root: root.to_path_buf(),
            entries: Vec::new(),
            skipped: Vec::new(),
            in_place: Vec::new(),
            stats: StatsSummary::default(),
        };
        let mut claimed: HashSet<PathBuf> = HashSet::new();

        for path in files {
            let Some(record) = self.snapshot(&path, &mut plan.skipped) else {
                continue;
            };
            let category = self.categories.resolve_category(&record.extension);
            let category_dir = root.join(category);

            if category_dir.exists() && !category_dir.is_dir() {
                plan.skipped.push(SkippedFile {
                    path,
                    reason: SkipReason::DestinationBlocked(category_dir),
                });
                continue;
            }

            let Some(destination) = free_destination(&category_dir, &record.name, &claimed)
            else {
                plan.skipped.push(SkippedFile {
                    path,
                    reason: SkipReason::NoFreeName,
                });
                continue;
            };

            tracing::debug!(
                source = %record.path.display(),
                destination = %destination.display(),
                category,
                "planned move"
            );
            claimed.insert(destination.clone());
            plan.entries.push(PlanEntry {
                source_path: record.path,
                destination_path: destination,
                category: category.to_string(),
                size_bytes: record.size_bytes,
            });
        }

        self.collect_in_place(root, &mut plan);
        plan.stats = summarize(
            plan.entries
                .iter()
                .map(|e| (e.category.as_str(), e.size_bytes))
                .chain(plan.in_place.iter().map(|f| (f.category.as_str(), f.size_bytes))),
        );

        tracing::info!(
            root = %root.display(),
            moves = plan.entries.len(),
            skipped = plan.skipped.len(),
            in_place = plan.in_place.len(),
            "plan built"
        );
        Ok(plan)
    }

    /// Reads and filters one file, recording why it was skipped if it is not kept.
    fn snapshot(&self, path: &Path, skipped: &mut Vec<SkippedFile>) -> Option<FileRecord> {
        let record = match self.reader.read(path) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable file");
                skipped.push(SkippedFile {
                    path: path.to_path_buf(),
                    reason: SkipReason::Unreadable(e.to_string()),
                });
                return None;
            }
        };

        if let Some(filter) = self.filter
            && !filter.matches(&record, self.categories)
        {
            skipped.push(SkippedFile {
                path: path.to_path_buf(),
                reason: SkipReason::FilteredOut,
            });
            return None;
        }
        Some(record)
    }

    /// Counts files that already live in the folder of the category they resolve to.
    ///
    /// Only the immediate files of each category folder are looked at, and
    /// folders that cannot be read are ignored since nothing would be moved
    /// out of them anyway.
    fn collect_in_place(&self, root: &Path, plan: &mut Plan) {
        let fallback = (!self.categories.contains(UNCATEGORIZED)).then_some(UNCATEGORIZED);
        let folders = self.categories.iter().map(|c| c.name()).chain(fallback);

        for folder in folders {
            let dir = root.join(folder);
            if !dir.is_dir() {
                continue;
            }
            let Ok(files) = list_files(&dir) else {
                continue;
            };
            for path in files {
                let Ok(record) = self.reader.read(&path) else {
                    continue;
                };
                if self.categories.resolve_category(&record.extension) != folder {
                    continue;
                }
                if let Some(filter) = self.filter
                    && !filter.matches(&record, self.categories)
                {
                    continue;
                }
                plan.in_place.push(InPlaceFile {
                    path: record.path,
                    category: folder.to_string(),
                    size_bytes: record.size_bytes,
                });
            }
        }
    }
}

/// Plans the reorganization of `root` using the filesystem metadata reader.
pub fn build_plan(
    root: &Path,
    categories: &CategorySet,
    filter: Option<&FilterSpec>,
) -> Result<Plan, PlanError> {
    PlanBuilder::new(categories).with_filter(filter).build(root)
}

/// Lists the immediate files of `dir`, sorted by name.
///
/// Symlinks are listed unless they point at a directory, so a dangling link
/// reaches the metadata reader and is reported as unreadable.
fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();
        if file_type.is_file() || (file_type.is_symlink() && !path.is_dir()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Finds the first destination for `file_name` in `dir` that neither exists
/// on disk nor is claimed by an earlier entry of the same plan.
fn free_destination(dir: &Path, file_name: &str, claimed: &HashSet<PathBuf>) -> Option<PathBuf> {
    let is_free = |candidate: &Path| {
        !claimed.contains(candidate) && fs::symlink_metadata(candidate).is_err()
    };

    let first = dir.join(file_name);
    if is_free(&first) {
        return Some(first);
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..=MAX_NAME_SUFFIX)
        .map(|n| dir.join(format!("{} ({}){}", stem, n, ext)))
        .find(|candidate| is_free(candidate))
}
