//! TOML configuration for storage locations, metadata reading and filtering.
//!
//! # Configuration File Format
//!
//! ```toml
//! [storage]
//! categories_file = "~/.config/tidyfold/categories.json"
//! history_file = "~/.config/tidyfold/history.json"
//! history_limit = 10
//!
//! [metadata]
//! sniff_missing_extensions = false
//!
//! [filters]
//! enable_hidden_files = false
//! extensions = [".pdf"]
//! min_size = "10 KB"
//! max_size = 1048576
//! date_field = "modified"
//! date_from = "2024-01-01"
//! date_to = "2024-12-31"
//! name_pattern = "*.png"
//! name_regex = false
//! categories = ["Images"]
//! ```
//!
//! Every section and key is optional.

use crate::engine::EngineSettings;
use crate::filter::{DateField, FilterSpec, FilterValidationError, NamePattern};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading or compiling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    #[error("IO error reading configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid configuration in {}: {source}", path.display())]
    ConfigInvalid {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid size '{value}': expected bytes or '<n> B|KB|MB|GB'")]
    InvalidSize { value: String },
    #[error("Invalid date '{value}': expected YYYY-MM-DD or RFC 3339")]
    InvalidDate { value: String },
    #[error(transparent)]
    Filter(#[from] FilterValidationError),
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    pub filters: FilterConfig,
}

/// Where the category store and the operation log live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub categories_file: Option<PathBuf>,
    pub history_file: Option<PathBuf>,
    /// Maximum number of operations kept for undo.
    pub history_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Guess the type of extension-less files from their content.
    pub sniff_missing_extensions: bool,
}

/// A size given either as a byte count or as text such as `"10 KB"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    Bytes(u64),
    Text(String),
}

impl SizeValue {
    pub fn to_bytes(&self) -> Result<u64, ConfigError> {
        match self {
            SizeValue::Bytes(n) => Ok(*n),
            SizeValue::Text(text) => parse_size(text),
        }
    }
}

/// The `[filters]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    pub enable_hidden_files: bool,
    pub extensions: Option<Vec<String>>,
    pub min_size: Option<SizeValue>,
    pub max_size: Option<SizeValue>,
    pub date_field: DateField,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub name_pattern: Option<String>,
    /// Treat `name_pattern` as a regular expression.
    pub name_regex: bool,
    pub categories: Option<Vec<String>>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enable_hidden_files: false,
            extensions: None,
            min_size: None,
            max_size: None,
            date_field: DateField::default(),
            date_from: None,
            date_to: None,
            name_pattern: None,
            name_regex: false,
            categories: None,
        }
    }
}

impl FilterConfig {
    /// Validates the table and builds the filter it describes.
    ///
    /// # Errors
    ///
    /// Returns an error for unparsable sizes or dates, inverted ranges and
    /// invalid name patterns.
    pub fn compile(&self) -> Result<FilterSpec, ConfigError> {
        let mut spec = FilterSpec::new().excluding_hidden(!self.enable_hidden_files);

        if let Some(extensions) = &self.extensions {
            spec = spec.with_extensions(extensions);
        }

        let min = self.min_size.as_ref().map(SizeValue::to_bytes).transpose()?;
        let max = self.max_size.as_ref().map(SizeValue::to_bytes).transpose()?;
        if min.is_some() || max.is_some() {
            spec = spec.with_size_range(min, max)?;
        }

        let from = self
            .date_from
            .as_deref()
            .map(|d| parse_date(d, DayBound::Start))
            .transpose()?;
        let to = self
            .date_to
            .as_deref()
            .map(|d| parse_date(d, DayBound::End))
            .transpose()?;
        if from.is_some() || to.is_some() {
            spec = spec.with_date_range(from, to, self.date_field)?;
        }

        if let Some(pattern) = &self.name_pattern {
            let pattern = if self.name_regex {
                NamePattern::regex(pattern)?
            } else {
                NamePattern::new(pattern)?
            };
            spec = spec.with_name_pattern(pattern);
        }

        if let Some(categories) = &self.categories {
            spec = spec.with_categories(categories.iter().cloned());
        }

        Ok(spec)
    }
}

impl Config {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.tidyfoldrc.toml` in the current directory
    /// 3. Look for `~/.config/tidyfold/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any discovered file is not valid TOML.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".tidyfoldrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(dir) = config_dir() {
            let home_config = dir.join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        tracing::debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::ConfigInvalid {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Resolves the storage and metadata sections into engine settings.
    ///
    /// Unset store paths default to `~/.config/tidyfold/`; a leading `~` is
    /// expanded to the home directory.
    pub fn engine_settings(&self) -> EngineSettings {
        let base = config_dir().unwrap_or_else(|| PathBuf::from(".tidyfold"));
        let resolve = |path: &Option<PathBuf>, default_name: &str| {
            path.as_deref()
                .map(expand_home)
                .unwrap_or_else(|| base.join(default_name))
        };
        EngineSettings {
            categories_file: Some(resolve(&self.storage.categories_file, "categories.json")),
            history_file: Some(resolve(&self.storage.history_file, "history.json")),
            history_limit: self.storage.history_limit,
            sniff_missing_extensions: self.metadata.sniff_missing_extensions,
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// `~/.config/tidyfold`, if the home directory is known.
pub fn config_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".config").join("tidyfold"))
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

/// Parses `"512"`, `"10 KB"`, `"1.5MB"` and the like into bytes (1 KB = 1024 B).
pub fn parse_size(text: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidSize {
        value: text.to_string(),
    };
    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        _ => return Err(invalid()),
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole.checked_mul(multiplier).ok_or_else(invalid);
    }
    let value: f64 = number.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Ok((value * multiplier as f64).round() as u64)
}

#[derive(Clone, Copy)]
enum DayBound {
    Start,
    End,
}

/// Parses an RFC 3339 timestamp or a plain date.
///
/// A plain date is the start of that day (UTC) as a lower bound and its last
/// instant as an upper bound, so `date_to = "2024-12-31"` includes the 31st.
fn parse_date(text: &str, bound: DayBound) -> Result<DateTime<Utc>, ConfigError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Ok(at.with_timezone(&Utc));
    }
    let invalid = || ConfigError::InvalidDate {
        value: text.to_string(),
    };
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| invalid())?;
    let at = match bound {
        DayBound::Start => date.and_hms_opt(0, 0, 0),
        DayBound::End => date.and_hms_nano_opt(23, 59, 59, 999_999_999),
    };
    at.map(|at| at.and_utc()).ok_or_else(invalid)
}

/// Parses a date the way the `[filters]` table does, as a lower bound.
pub fn parse_date_from(text: &str) -> Result<DateTime<Utc>, ConfigError> {
    parse_date(text, DayBound::Start)
}

/// Parses a date the way the `[filters]` table does, as an upper bound.
pub fn parse_date_to(text: &str) -> Result<DateTime<Utc>, ConfigError> {
    parse_date(text, DayBound::End)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_category::CategorySet;
    use crate::metadata::FileRecord;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(name: &str, size: u64) -> FileRecord {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        FileRecord::from_parts(format!("/tmp/{}", name), size, at, at)
    }

    #[test]
    fn test_default_config_hides_hidden_files() {
        let config = Config::default();
        assert!(!config.filters.enable_hidden_files);

        let spec = config.filters.compile().unwrap();
        assert!(spec.excludes_hidden());
        let categories = CategorySet::defaults();
        assert!(!spec.matches(&record(".DS_Store", 1), &categories));
        assert!(spec.matches(&record("photo.png", 1), &categories));
    }

    #[test]
    fn test_load_full_config() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[storage]
history_file = "/var/tmp/history.json"
history_limit = 5

[metadata]
sniff_missing_extensions = true

[filters]
enable_hidden_files = true
extensions = ["PDF", ".png"]
min_size = "1 KB"
max_size = 4096
date_field = "created"
date_from = "2024-01-01"
date_to = "2024-12-31"
name_pattern = "report*"
categories = ["Documents", "Images"]
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).expect("config should load");
        assert_eq!(config.storage.history_limit, Some(5));
        assert!(config.metadata.sniff_missing_extensions);
        assert_eq!(config.filters.date_field, DateField::Created);

        let settings = config.engine_settings();
        assert_eq!(settings.history_file, Some(PathBuf::from("/var/tmp/history.json")));
        assert_eq!(settings.history_limit, Some(5));
        assert!(settings.sniff_missing_extensions);

        let spec = config.filters.compile().expect("filters should compile");
        assert!(!spec.excludes_hidden());
        let size = spec.size_range().expect("size range");
        assert_eq!((size.min(), size.max()), (Some(1024), Some(4096)));
        let exts = spec.extensions().expect("extensions");
        assert!(exts.contains(".pdf") && exts.contains(".png"));
        assert_eq!(spec.name_pattern().map(|p| p.as_str()), Some("report*"));

        let categories = CategorySet::defaults();
        assert!(spec.matches(&record("report-q2.pdf", 2048), &categories));
        assert!(!spec.matches(&record("report-q2.pdf", 100), &categories));
        assert!(!spec.matches(&record("notes.pdf", 2048), &categories));
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let result = Config::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[filters\nextensions = 3").unwrap();

        let result = Config::load(Some(&path));
        assert!(matches!(result, Err(ConfigError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("10 KB").unwrap(), 10 * 1024);
        assert_eq!(parse_size("1.5mb").unwrap(), 1024 * 1024 * 3 / 2);
        assert_eq!(parse_size("2GB").unwrap(), 2 * 1024 * 1024 * 1024);
        assert!(parse_size("ten KB").is_err());
        assert!(parse_size("5 TB").is_err());
    }

    #[test]
    fn test_inverted_size_range_is_rejected() {
        let filters = FilterConfig {
            min_size: Some(SizeValue::Text("2 KB".to_string())),
            max_size: Some(SizeValue::Bytes(10)),
            ..Default::default()
        };
        assert!(matches!(
            filters.compile(),
            Err(ConfigError::Filter(FilterValidationError::SizeRange { .. }))
        ));
    }

    #[test]
    fn test_date_bounds_cover_whole_days() {
        let from = parse_date_from("2024-06-01").unwrap();
        let to = parse_date_to("2024-06-01").unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert!(to > Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 59).unwrap());
        assert!(to < Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap());

        let exact = parse_date_from("2024-06-01T08:30:00+02:00").unwrap();
        assert_eq!(exact, Utc.with_ymd_and_hms(2024, 6, 1, 6, 30, 0).unwrap());
        assert!(matches!(
            parse_date_from("June 1st"),
            Err(ConfigError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_invalid_regex_returns_error() {
        let filters = FilterConfig {
            name_pattern: Some("[invalid(".to_string()),
            name_regex: true,
            ..Default::default()
        };
        assert!(matches!(
            filters.compile(),
            Err(ConfigError::Filter(FilterValidationError::NamePattern { .. }))
        ));
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = home_dir() {
            assert_eq!(expand_home(Path::new("~/x.json")), home.join("x.json"));
        }
        assert_eq!(expand_home(Path::new("/abs/x.json")), PathBuf::from("/abs/x.json"));
    }
}
