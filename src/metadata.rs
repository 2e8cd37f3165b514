//! Read-only file snapshots used by the filter engine and the plan builder.
//!
//! Every file is captured once per scan into a [`FileRecord`] so that
//! filtering, categorization and statistics all see the same values even if
//! the file changes while a plan is being built.

use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A snapshot of one file's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Full path of the file.
    pub path: PathBuf,
    /// File name including the extension.
    pub name: String,
    /// Normalized extension (`".png"`), or an empty string when the file has none.
    pub extension: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modification time.
    pub modified_at: DateTime<Utc>,
    /// Creation time, or the modification time where the platform does not record one.
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Builds a record from already known values.
    ///
    /// The extension is derived from `path` the same way a filesystem scan
    /// would derive it.
    pub fn from_parts(
        path: impl Into<PathBuf>,
        size_bytes: u64,
        modified_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let path = path.into();
        let name = file_name_of(&path);
        Self {
            extension: extension_of(&name),
            name,
            path,
            size_bytes,
            modified_at,
            created_at,
        }
    }
}

/// Normalizes an extension: trimmed, lower-case, with a single leading dot.
///
/// An empty input stays empty.
///
/// ```
/// use tidyfold::metadata::normalize_extension;
///
/// assert_eq!(normalize_extension("PNG"), ".png");
/// assert_eq!(normalize_extension(" .Tar "), ".tar");
/// assert_eq!(normalize_extension(""), "");
/// ```
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(".{}", trimmed.to_lowercase())
    }
}

/// Returns the normalized extension of a file name.
///
/// Dot files such as `.bashrc` have no extension.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|ext| normalize_extension(&ext.to_string_lossy()))
        .unwrap_or_default()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Source of [`FileRecord`] snapshots.
///
/// The plan builder reads metadata through this trait so that alternative
/// sources can stand in for the filesystem.
pub trait MetadataReader {
    /// Captures a snapshot of the file at `path`.
    fn read(&self, path: &Path) -> io::Result<FileRecord>;
}

/// Reads metadata from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMetadataReader {
    sniff_missing_extensions: bool,
}

impl FsMetadataReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// When enabled, files without an extension get one from their content
    /// signature (for example a PNG saved as `scan` is read as `.png`).
    pub fn with_content_sniffing(mut self, enabled: bool) -> Self {
        self.sniff_missing_extensions = enabled;
        self
    }

    fn sniff_extension(path: &Path) -> Option<String> {
        match infer::get_from_path(path) {
            Ok(Some(kind)) => Some(normalize_extension(kind.extension())),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "content sniffing failed");
                None
            }
        }
    }
}

impl MetadataReader for FsMetadataReader {
    fn read(&self, path: &Path) -> io::Result<FileRecord> {
        let meta = fs::metadata(path)?;
        let modified_at: DateTime<Utc> = meta.modified()?.into();
        let created_at = meta
            .created()
            .map(DateTime::<Utc>::from)
            .unwrap_or(modified_at);

        let mut record = FileRecord::from_parts(path, meta.len(), modified_at, created_at);
        if record.extension.is_empty()
            && self.sniff_missing_extensions
            && let Some(ext) = Self::sniff_extension(path)
        {
            record.extension = ext;
        }
        Ok(record)
    }
}
