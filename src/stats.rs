//! Per-category file counts and sizes.
//!
//! The same aggregation backs plan previews and statistics over a live
//! directory, so both views always agree.

use serde::Serialize;
use std::collections::BTreeMap;

/// Count and total size of the files in one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub count: usize,
    pub total_bytes: u64,
}

/// Aggregated statistics for a set of categorized files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    /// Per-category totals, sorted by category name.
    pub per_category: BTreeMap<String, CategoryStats>,
    pub total_files: usize,
    pub total_bytes: u64,
}

impl StatsSummary {
    /// Adds one file of `size_bytes` to `category`.
    pub fn record(&mut self, category: &str, size_bytes: u64) {
        let entry = self.per_category.entry(category.to_string()).or_default();
        entry.count += 1;
        entry.total_bytes += size_bytes;
        self.total_files += 1;
        self.total_bytes += size_bytes;
    }

    pub fn get(&self, category: &str) -> Option<&CategoryStats> {
        self.per_category.get(category)
    }

    pub fn is_empty(&self) -> bool {
        self.total_files == 0
    }
}

/// Aggregates `(category, size)` pairs into a summary.
pub fn summarize<'a, I>(files: I) -> StatsSummary
where
    I: IntoIterator<Item = (&'a str, u64)>,
{
    let mut summary = StatsSummary::default();
    for (category, size) in files {
        summary.record(category, size);
    }
    summary
}

/// Formats a byte count for display.
///
/// ```
/// use tidyfold::stats::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let size = bytes as f64;
    if size < KB {
        format!("{} B", bytes)
    } else if size < MB {
        format!("{:.1} KB", size / KB)
    } else if size < GB {
        format!("{:.1} MB", size / MB)
    } else {
        format!("{:.1} GB", size / GB)
    }
}
