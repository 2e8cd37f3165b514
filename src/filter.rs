//! Composable file filters.
//!
//! A [`FilterSpec`] is a set of optional constraints over a [`FileRecord`].
//! Every present constraint must hold for a file to match; absent
//! constraints match everything. Ranges are validated when they are built,
//! so a spec that exists is always a valid one.
//!
//! ```
//! use tidyfold::filter::FilterSpec;
//!
//! let spec = FilterSpec::new()
//!     .with_extensions([".png", "jpg"])
//!     .with_size_range(Some(1024), None)
//!     .unwrap();
//! assert!(spec.size_range().is_some());
//! ```

use crate::file_category::CategorySet;
use crate::metadata::{FileRecord, normalize_extension};
use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised when a filter is constructed with invalid bounds or patterns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterValidationError {
    #[error("invalid size range: minimum {min} is greater than maximum {max}")]
    SizeRange { min: u64, max: u64 },
    #[error("invalid date range: {from} is after {to}")]
    DateRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    #[error("invalid name pattern '{pattern}': {reason}")]
    NamePattern { pattern: String, reason: String },
}

/// Inclusive size bounds in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeRange {
    min: Option<u64>,
    max: Option<u64>,
}

impl SizeRange {
    pub fn new(min: Option<u64>, max: Option<u64>) -> Result<Self, FilterValidationError> {
        if let (Some(min), Some(max)) = (min, max)
            && min > max
        {
            return Err(FilterValidationError::SizeRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> Option<u64> {
        self.min
    }

    pub fn max(&self) -> Option<u64> {
        self.max
    }

    pub fn contains(&self, size: u64) -> bool {
        self.min.is_none_or(|min| size >= min) && self.max.is_none_or(|max| size <= max)
    }
}

/// Which timestamp a [`DateRange`] is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateField {
    #[default]
    Modified,
    Created,
}

/// Inclusive time bounds over the modification or creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    field: DateField,
}

impl DateRange {
    pub fn new(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        field: DateField,
    ) -> Result<Self, FilterValidationError> {
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Err(FilterValidationError::DateRange { from, to });
        }
        Ok(Self { from, to, field })
    }

    pub fn from(&self) -> Option<DateTime<Utc>> {
        self.from
    }

    pub fn to(&self) -> Option<DateTime<Utc>> {
        self.to
    }

    pub fn field(&self) -> DateField {
        self.field
    }

    pub fn contains(&self, record: &FileRecord) -> bool {
        let at = match self.field {
            DateField::Modified => record.modified_at,
            DateField::Created => record.created_at,
        };
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

/// A case-insensitive file name pattern, parsed once at construction.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    matcher: NameMatcher,
}

#[derive(Debug, Clone)]
enum NameMatcher {
    Substring(String),
    Glob(Pattern),
    Regex(Regex),
}

impl NamePattern {
    /// Parses a substring or wildcard pattern.
    ///
    /// Patterns containing `*` or `?` are matched against the whole file
    /// name; every other character is literal. Patterns without a wildcard
    /// are a substring search.
    pub fn new(pattern: &str) -> Result<Self, FilterValidationError> {
        let matcher = if pattern.contains(['*', '?']) {
            let escaped: String = pattern
                .chars()
                .map(|c| match c {
                    '*' | '?' => c.to_string(),
                    _ => Pattern::escape(&c.to_string()),
                })
                .collect();
            let glob = Pattern::new(&escaped).map_err(|e| FilterValidationError::NamePattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            NameMatcher::Glob(glob)
        } else {
            NameMatcher::Substring(pattern.to_lowercase())
        };
        Ok(Self {
            source: pattern.to_string(),
            matcher,
        })
    }

    /// Parses a regular expression searched anywhere in the file name.
    pub fn regex(pattern: &str) -> Result<Self, FilterValidationError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| FilterValidationError::NamePattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            source: pattern.to_string(),
            matcher: NameMatcher::Regex(regex),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, file_name: &str) -> bool {
        match &self.matcher {
            NameMatcher::Substring(needle) => file_name.to_lowercase().contains(needle.as_str()),
            NameMatcher::Glob(glob) => glob.matches_with(
                file_name,
                MatchOptions {
                    case_sensitive: false,
                    require_literal_separator: false,
                    require_literal_leading_dot: false,
                },
            ),
            NameMatcher::Regex(regex) => regex.is_match(file_name),
        }
    }
}

impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && matches!(
                (&self.matcher, &other.matcher),
                (NameMatcher::Regex(_), NameMatcher::Regex(_))
                    | (NameMatcher::Glob(_), NameMatcher::Glob(_))
                    | (NameMatcher::Substring(_), NameMatcher::Substring(_))
            )
    }
}

/// A conjunction of optional file constraints.
///
/// The default spec has no constraints and matches every file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    extensions: Option<BTreeSet<String>>,
    size_range: Option<SizeRange>,
    date_range: Option<DateRange>,
    name_pattern: Option<NamePattern>,
    categories: Option<BTreeSet<String>>,
    exclude_hidden: bool,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to files with one of these extensions (normalized).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = Some(
            extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .collect(),
        );
        self
    }

    pub fn with_size_range(
        mut self,
        min: Option<u64>,
        max: Option<u64>,
    ) -> Result<Self, FilterValidationError> {
        self.size_range = Some(SizeRange::new(min, max)?);
        Ok(self)
    }

    pub fn with_date_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        field: DateField,
    ) -> Result<Self, FilterValidationError> {
        self.date_range = Some(DateRange::new(from, to, field)?);
        Ok(self)
    }

    pub fn with_name_pattern(mut self, pattern: NamePattern) -> Self {
        self.name_pattern = Some(pattern);
        self
    }

    /// Restricts to files resolving to one of these category names.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    /// Skips files whose name starts with a dot.
    pub fn excluding_hidden(mut self, exclude: bool) -> Self {
        self.exclude_hidden = exclude;
        self
    }

    pub fn extensions(&self) -> Option<&BTreeSet<String>> {
        self.extensions.as_ref()
    }

    pub fn size_range(&self) -> Option<&SizeRange> {
        self.size_range.as_ref()
    }

    pub fn date_range(&self) -> Option<&DateRange> {
        self.date_range.as_ref()
    }

    pub fn name_pattern(&self) -> Option<&NamePattern> {
        self.name_pattern.as_ref()
    }

    pub fn categories(&self) -> Option<&BTreeSet<String>> {
        self.categories.as_ref()
    }

    pub fn excludes_hidden(&self) -> bool {
        self.exclude_hidden
    }

    /// Returns true when no constraint is set.
    pub fn is_unconstrained(&self) -> bool {
        self == &Self::default()
    }

    /// Checks a record against every present constraint.
    ///
    /// `categories` is only consulted when the spec restricts categories.
    pub fn matches(&self, record: &FileRecord, categories: &CategorySet) -> bool {
        if self.exclude_hidden && record.name.starts_with('.') {
            return false;
        }
        if let Some(exts) = &self.extensions
            && !exts.contains(&record.extension)
        {
            return false;
        }
        if let Some(range) = &self.size_range
            && !range.contains(record.size_bytes)
        {
            return false;
        }
        if let Some(range) = &self.date_range
            && !range.contains(record)
        {
            return false;
        }
        if let Some(pattern) = &self.name_pattern
            && !pattern.is_match(&record.name)
        {
            return false;
        }
        if let Some(names) = &self.categories
            && !names.contains(categories.resolve_category(&record.extension))
        {
            return false;
        }
        true
    }
}

/// Free-function form of [`FilterSpec::matches`].
pub fn matches(record: &FileRecord, spec: &FilterSpec, categories: &CategorySet) -> bool {
    spec.matches(record, categories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_category::Category;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn record(name: &str, size: u64) -> FileRecord {
        FileRecord::from_parts(
            format!("/data/{}", name),
            size,
            at(2024, 6, 15),
            at(2023, 1, 1),
        )
    }

    fn categories() -> CategorySet {
        CategorySet::new(vec![
            Category::new("Images", [".png", ".jpg"]).unwrap(),
            Category::new("Docs", [".pdf"]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_spec_matches_everything() {
        let spec = FilterSpec::new();
        let cats = categories();
        assert!(spec.is_unconstrained());
        for name in ["a.png", ".hidden", "README", "big.iso"] {
            assert!(matches(&record(name, u64::MAX), &spec, &cats));
            assert!(matches(&record(name, 0), &spec, &cats));
        }
    }

    #[test]
    fn test_extension_filter() {
        let spec = FilterSpec::new().with_extensions(["PNG", ".pdf"]);
        let cats = categories();
        assert!(spec.matches(&record("a.png", 1), &cats));
        assert!(spec.matches(&record("b.PDF", 1), &cats));
        assert!(!spec.matches(&record("c.txt", 1), &cats));
        assert!(!spec.matches(&record("README", 1), &cats));
    }

    #[test]
    fn test_size_range_inclusive() {
        let spec = FilterSpec::new()
            .with_size_range(Some(10), Some(20))
            .unwrap();
        let cats = categories();
        assert!(!spec.matches(&record("a", 9), &cats));
        assert!(spec.matches(&record("a", 10), &cats));
        assert!(spec.matches(&record("a", 20), &cats));
        assert!(!spec.matches(&record("a", 21), &cats));
    }

    #[test]
    fn test_open_ended_size_range() {
        let cats = categories();
        let min_only = FilterSpec::new().with_size_range(Some(5), None).unwrap();
        assert!(min_only.matches(&record("a", u64::MAX), &cats));
        assert!(!min_only.matches(&record("a", 4), &cats));
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert_eq!(
            SizeRange::new(Some(10), Some(5)),
            Err(FilterValidationError::SizeRange { min: 10, max: 5 })
        );
        assert!(
            DateRange::new(Some(at(2024, 2, 1)), Some(at(2024, 1, 1)), DateField::Modified)
                .is_err()
        );
        assert!(SizeRange::new(Some(5), Some(5)).is_ok());
    }

    #[test]
    fn test_date_range_field_selection() {
        let cats = categories();
        let r = record("a.txt", 1);

        let modified = FilterSpec::new()
            .with_date_range(Some(at(2024, 6, 15)), Some(at(2024, 6, 15)), DateField::Modified)
            .unwrap();
        assert!(modified.matches(&r, &cats));

        let created = FilterSpec::new()
            .with_date_range(Some(at(2024, 1, 1)), None, DateField::Created)
            .unwrap();
        assert!(!created.matches(&r, &cats));
    }

    #[test]
    fn test_name_pattern_substring_is_case_insensitive() {
        let pattern = NamePattern::new("Invoice").unwrap();
        assert!(pattern.is_match("2024-invoice-march.pdf"));
        assert!(pattern.is_match("INVOICE.PDF"));
        assert!(!pattern.is_match("receipt.pdf"));
    }

    #[test]
    fn test_name_pattern_glob() {
        let star = NamePattern::new("*.PNG").unwrap();
        assert!(star.is_match("photo.png"));
        assert!(!star.is_match("photo.png.bak"));

        let question = NamePattern::new("file?.txt").unwrap();
        assert!(question.is_match("file1.txt"));
        assert!(!question.is_match("file12.txt"));
    }

    #[test]
    fn test_name_pattern_brackets_are_literal() {
        let pattern = NamePattern::new("[draft]*").unwrap();
        assert!(pattern.is_match("[draft] notes.txt"));
        assert!(!pattern.is_match("d notes.txt"));
    }

    #[test]
    fn test_name_pattern_regex() {
        let pattern = NamePattern::regex(r"^img_\d+").unwrap();
        assert!(pattern.is_match("IMG_0042.jpg"));
        assert!(!pattern.is_match("photo_0042.jpg"));
        assert!(matches!(
            NamePattern::regex("[unclosed("),
            Err(FilterValidationError::NamePattern { .. })
        ));
    }

    #[test]
    fn test_category_filter() {
        let cats = categories();
        let spec = FilterSpec::new().with_categories(["Images", "Uncategorized"]);
        assert!(spec.matches(&record("a.jpg", 1), &cats));
        assert!(spec.matches(&record("notes.txt", 1), &cats));
        assert!(!spec.matches(&record("b.pdf", 1), &cats));
    }

    #[test]
    fn test_hidden_exclusion() {
        let cats = categories();
        let spec = FilterSpec::new().excluding_hidden(true);
        assert!(!spec.matches(&record(".DS_Store", 1), &cats));
        assert!(spec.matches(&record("visible.txt", 1), &cats));
    }

    #[test]
    fn test_fields_combine_with_and() {
        let cats = categories();
        let spec = FilterSpec::new()
            .with_extensions([".png"])
            .with_size_range(Some(100), None)
            .unwrap()
            .with_name_pattern(NamePattern::new("holiday").unwrap());

        assert!(spec.matches(&record("holiday-1.png", 500), &cats));
        assert!(!spec.matches(&record("holiday-1.png", 50), &cats));
        assert!(!spec.matches(&record("work.png", 500), &cats));
        assert!(!spec.matches(&record("holiday-1.jpg", 500), &cats));
    }
}
