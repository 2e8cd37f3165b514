/// Category rules for organizing files by extension.
///
/// A [`CategorySet`] maps each normalized extension to the name of the
/// category folder its files are moved into. Categories are kept in write
/// order: when two categories claim the same extension the most recently
/// written one wins, and the contested extensions are reported as
/// [`ExtensionConflict`]s.
///
/// # Examples
///
/// ```
/// use tidyfold::file_category::{CategorySet, UNCATEGORIZED};
///
/// let categories = CategorySet::defaults();
/// assert_eq!(categories.resolve_category(".PNG"), "Images");
/// assert_eq!(categories.resolve_category("pdf"), "Documents");
/// assert_eq!(categories.resolve_category(".unknown"), UNCATEGORIZED);
/// ```
use crate::metadata::normalize_extension;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

/// Folder name for files whose extension no category claims.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Errors raised when editing the category set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    #[error("category '{0}' already exists")]
    DuplicateCategory(String),
    #[error("category '{0}' not found")]
    NotFound(String),
    #[error("invalid category name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
}

/// A named group of file extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    name: String,
    extensions: BTreeSet<String>,
}

impl Category {
    /// Creates a category, normalizing every extension.
    ///
    /// The name becomes a directory name, so it must be non-empty and free
    /// of path separators.
    pub fn new<I, S>(name: &str, extensions: I) -> Result<Self, CategoryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.trim();
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            extensions: extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .filter(|ext| !ext.is_empty())
                .collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }

    /// Re-applies the construction rules; used for categories read from disk.
    fn normalized(self) -> Result<Self, CategoryError> {
        Self::new(&self.name, self.extensions)
    }
}

fn validate_name(name: &str) -> Result<(), CategoryError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name == "." || name == ".." {
        Some("name is a relative path component")
    } else if name.contains(['/', '\\']) {
        Some("name contains a path separator")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(CategoryError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// An extension claimed by more than one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionConflict {
    /// The contested extension.
    pub extension: String,
    /// The category files with this extension are filed under.
    pub winner: String,
    /// Earlier categories whose claim is ignored, in write order.
    pub shadowed: Vec<String>,
}

impl fmt::Display for ExtensionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "extension '{}' is claimed by {} and {}; using {}",
            self.extension,
            self.shadowed.join(", "),
            self.winner,
            self.winner
        )
    }
}

/// The active set of categories with an extension index.
#[derive(Debug, Clone)]
pub struct CategorySet {
    categories: Vec<Category>,
    index: HashMap<String, usize>,
    conflicts: Vec<ExtensionConflict>,
}

impl CategorySet {
    /// Builds a set from categories in write order.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryError::DuplicateCategory`] if two categories share a name.
    pub fn new(categories: Vec<Category>) -> Result<Self, CategoryError> {
        let mut seen = BTreeSet::new();
        let mut normalized = Vec::with_capacity(categories.len());
        for category in categories {
            let category = category.normalized()?;
            if !seen.insert(category.name.clone()) {
                return Err(CategoryError::DuplicateCategory(category.name));
            }
            normalized.push(category);
        }

        let mut set = Self {
            categories: normalized,
            index: HashMap::new(),
            conflicts: Vec::new(),
        };
        set.rebuild_index();
        Ok(set)
    }

    /// The built-in categories used when no saved configuration exists.
    pub fn defaults() -> Self {
        let categories = default_categories()
            .into_iter()
            .map(|(name, exts)| Category {
                name: name.to_string(),
                extensions: exts.iter().map(|ext| ext.to_string()).collect(),
            })
            .collect();
        let mut set = Self {
            categories,
            index: HashMap::new(),
            conflicts: Vec::new(),
        };
        set.rebuild_index();
        set
    }

    /// Returns the category name for an extension, or [`UNCATEGORIZED`].
    ///
    /// The lookup is case-insensitive and accepts the extension with or
    /// without its leading dot.
    pub fn resolve_category(&self, extension: &str) -> &str {
        let ext = normalize_extension(extension);
        self.index
            .get(&ext)
            .map(|&i| self.categories[i].name.as_str())
            .unwrap_or(UNCATEGORIZED)
    }

    /// Adds a new category and returns the conflicts across the whole set.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryError::DuplicateCategory`] if the name is taken.
    pub fn add_category<I, S>(
        &mut self,
        name: &str,
        extensions: I,
    ) -> Result<Vec<ExtensionConflict>, CategoryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let category = Category::new(name, extensions)?;
        if self.position(&category.name).is_some() {
            return Err(CategoryError::DuplicateCategory(category.name));
        }
        self.categories.push(category);
        self.rebuild_index();
        Ok(self.conflicts.clone())
    }

    /// Replaces the extensions of an existing category.
    ///
    /// The updated category becomes the latest writer, so it wins every
    /// extension it shares with other categories.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryError::NotFound`] if no category has this name.
    pub fn update_category<I, S>(
        &mut self,
        name: &str,
        extensions: I,
    ) -> Result<Vec<ExtensionConflict>, CategoryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let category = Category::new(name, extensions)?;
        let pos = self
            .position(&category.name)
            .ok_or_else(|| CategoryError::NotFound(category.name.clone()))?;
        self.categories.remove(pos);
        self.categories.push(category);
        self.rebuild_index();
        Ok(self.conflicts.clone())
    }

    /// Removes a category and returns it.
    pub fn remove_category(&mut self, name: &str) -> Result<Category, CategoryError> {
        let pos = self
            .position(name.trim())
            .ok_or_else(|| CategoryError::NotFound(name.trim().to_string()))?;
        let removed = self.categories.remove(pos);
        self.rebuild_index();
        Ok(removed)
    }

    /// Restores the built-in categories.
    pub fn reset_to_defaults(&mut self) {
        *self = Self::defaults();
    }

    /// Extensions currently claimed by more than one category.
    pub fn conflicts(&self) -> &[ExtensionConflict] {
        &self.conflicts
    }

    pub fn get(&self, name: &str) -> Option<&Category> {
        self.position(name).map(|i| &self.categories[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Categories in write order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.name == name)
    }

    /// Rebuilds the extension index and the conflict list from scratch.
    fn rebuild_index(&mut self) {
        let mut claims: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, category) in self.categories.iter().enumerate() {
            for ext in &category.extensions {
                claims.entry(ext.as_str()).or_default().push(i);
            }
        }

        let mut index = HashMap::with_capacity(claims.len());
        let mut conflicts = Vec::new();
        for (ext, owners) in claims {
            // Owners are in write order, so the last one is the latest writer.
            let winner = owners[owners.len() - 1];
            index.insert(ext.to_string(), winner);
            if owners.len() > 1 {
                conflicts.push(ExtensionConflict {
                    extension: ext.to_string(),
                    winner: self.categories[winner].name.clone(),
                    shadowed: owners[..owners.len() - 1]
                        .iter()
                        .map(|&i| self.categories[i].name.clone())
                        .collect(),
                });
            }
        }

        for conflict in &conflicts {
            tracing::warn!("{}", conflict);
        }
        self.index = index;
        self.conflicts = conflicts;
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::defaults()
    }
}

fn default_categories() -> Vec<(&'static str, &'static [&'static str])> {
    vec![
        (
            "Documents",
            &[
                ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".txt", ".rtf",
                ".odt", ".ods", ".odp", ".csv", ".md", ".epub",
            ],
        ),
        (
            "Images",
            &[
                ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".svg", ".webp", ".ico",
                ".heic",
            ],
        ),
        (
            "Videos",
            &[
                ".mp4", ".mov", ".avi", ".mkv", ".wmv", ".flv", ".webm", ".m4v", ".3gp",
            ],
        ),
        (
            "Audio",
            &[".mp3", ".wav", ".aac", ".ogg", ".flac", ".m4a", ".wma"],
        ),
        (
            "Compressed",
            &[".zip", ".rar", ".tar", ".gz", ".7z", ".bz2", ".xz"],
        ),
        (
            "Code",
            &[
                ".py", ".js", ".ts", ".html", ".css", ".java", ".c", ".cpp", ".h", ".cs",
                ".php", ".rb", ".go", ".rs", ".sh", ".bat", ".json", ".toml", ".yaml", ".yml",
            ],
        ),
        (
            "Executables",
            &[
                ".exe", ".msi", ".dmg", ".pkg", ".deb", ".rpm", ".appimage",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images_and_docs() -> CategorySet {
        CategorySet::new(vec![
            Category::new("Images", [".png", ".jpg"]).unwrap(),
            Category::new("Docs", [".pdf"]).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_defaults_have_no_conflicts() {
        let categories = CategorySet::defaults();
        assert_eq!(categories.len(), 7);
        assert!(categories.conflicts().is_empty());
        for name in [
            "Documents",
            "Images",
            "Videos",
            "Audio",
            "Compressed",
            "Code",
            "Executables",
        ] {
            assert!(categories.contains(name), "missing default {}", name);
        }
    }

    #[test]
    fn test_resolve_category_case_insensitive() {
        let categories = images_and_docs();
        assert_eq!(categories.resolve_category(".PNG"), "Images");
        assert_eq!(categories.resolve_category("jpg"), "Images");
        assert_eq!(categories.resolve_category(".Pdf"), "Docs");
    }

    #[test]
    fn test_resolve_unknown_and_empty() {
        let categories = images_and_docs();
        assert_eq!(categories.resolve_category(".txt"), UNCATEGORIZED);
        assert_eq!(categories.resolve_category(""), UNCATEGORIZED);
    }

    #[test]
    fn test_category_normalizes_extensions() {
        let category = Category::new("Mixed", ["PNG", ".Jpg", " gif ", ""]).unwrap();
        let exts: Vec<_> = category.extensions().iter().cloned().collect();
        assert_eq!(exts, vec![".gif", ".jpg", ".png"]);
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(matches!(
            Category::new("", [".a"]),
            Err(CategoryError::InvalidName { .. })
        ));
        assert!(matches!(
            Category::new("a/b", [".a"]),
            Err(CategoryError::InvalidName { .. })
        ));
        assert!(matches!(
            Category::new("..", [".a"]),
            Err(CategoryError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_add_duplicate_category_fails() {
        let mut categories = images_and_docs();
        let result = categories.add_category("Images", [".gif"]);
        assert_eq!(
            result,
            Err(CategoryError::DuplicateCategory("Images".to_string()))
        );
    }

    #[test]
    fn test_update_missing_category_fails() {
        let mut categories = images_and_docs();
        let result = categories.update_category("Music", [".mp3"]);
        assert_eq!(result, Err(CategoryError::NotFound("Music".to_string())));
    }

    #[test]
    fn test_add_reports_conflict_and_last_writer_wins() {
        let mut categories = images_and_docs();
        let conflicts = categories.add_category("Scans", [".pdf", ".tiff"]).unwrap();

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].extension, ".pdf");
        assert_eq!(conflicts[0].winner, "Scans");
        assert_eq!(conflicts[0].shadowed, vec!["Docs".to_string()]);
        assert_eq!(categories.resolve_category(".pdf"), "Scans");
        assert_eq!(categories.resolve_category(".tiff"), "Scans");
    }

    #[test]
    fn test_update_makes_category_latest_writer() {
        let mut categories = images_and_docs();
        categories.add_category("Scans", [".pdf"]).unwrap();
        assert_eq!(categories.resolve_category(".pdf"), "Scans");

        let conflicts = categories.update_category("Docs", [".pdf", ".txt"]).unwrap();
        assert_eq!(categories.resolve_category(".pdf"), "Docs");
        assert_eq!(conflicts[0].winner, "Docs");
        assert_eq!(conflicts[0].shadowed, vec!["Scans".to_string()]);
    }

    #[test]
    fn test_update_revalidates_whole_set() {
        let mut categories = images_and_docs();
        categories.add_category("Scans", [".pdf"]).unwrap();
        assert_eq!(categories.conflicts().len(), 1);

        // Removing the contested extension from the winner clears the conflict
        // and hands the extension back to the other claimant.
        let conflicts = categories.update_category("Scans", [".tiff"]).unwrap();
        assert!(conflicts.is_empty());
        assert_eq!(categories.resolve_category(".pdf"), "Docs");
    }

    #[test]
    fn test_new_rejects_duplicate_names() {
        let result = CategorySet::new(vec![
            Category::new("Images", [".png"]).unwrap(),
            Category::new("Images", [".jpg"]).unwrap(),
        ]);
        assert!(matches!(result, Err(CategoryError::DuplicateCategory(_))));
    }

    #[test]
    fn test_remove_and_reset() {
        let mut categories = images_and_docs();
        let removed = categories.remove_category("Docs").unwrap();
        assert_eq!(removed.name(), "Docs");
        assert_eq!(categories.resolve_category(".pdf"), UNCATEGORIZED);
        assert!(categories.remove_category("Docs").is_err());

        categories.reset_to_defaults();
        assert_eq!(categories.resolve_category(".pdf"), "Documents");
    }

    #[test]
    fn test_conflict_display() {
        let conflict = ExtensionConflict {
            extension: ".pdf".to_string(),
            winner: "Scans".to_string(),
            shadowed: vec!["Docs".to_string()],
        };
        assert_eq!(
            conflict.to_string(),
            "extension '.pdf' is claimed by Docs and Scans; using Scans"
        );
    }
}
