//! JSON persistence for the category store and the operation log.
//!
//! Both stores are rewritten in full on every mutation. Writes go to a
//! sibling temporary file that is then renamed over the target, so a crash
//! leaves either the old or the new content on disk.

use crate::file_category::{Category, CategoryError, CategorySet};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current on-disk format version of both stores.
pub const STORE_VERSION: u32 = 1;

/// Errors reading or writing a store file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid format in {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid categories in {}: {source}", path.display())]
    Categories {
        path: PathBuf,
        #[source]
        source: CategoryError,
    },
}

/// Reads and deserializes a JSON file, returning `None` if it does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StoreError::Format {
            path: path.to_path_buf(),
            source,
        })
}

/// Serializes `value` as pretty JSON and atomically replaces `path`.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Format {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, json).map_err(write_err)?;
    fs::rename(&tmp_path, path).map_err(write_err)
}

#[derive(Serialize, serde::Deserialize)]
struct CategoryFile {
    version: u32,
    categories: Vec<Category>,
}

/// The persisted category configuration.
#[derive(Debug, Clone)]
pub struct CategoryStore {
    path: PathBuf,
}

impl CategoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the saved categories, or the defaults if nothing was saved yet.
    pub fn load(&self) -> Result<CategorySet, StoreError> {
        let Some(file) = read_json::<CategoryFile>(&self.path)? else {
            tracing::info!(path = %self.path.display(), "no saved categories, using defaults");
            return Ok(CategorySet::defaults());
        };
        CategorySet::new(file.categories).map_err(|source| StoreError::Categories {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, categories: &CategorySet) -> Result<(), StoreError> {
        let file = CategoryFile {
            version: STORE_VERSION,
            categories: categories.iter().cloned().collect(),
        };
        write_json(&self.path, &file)
    }
}
