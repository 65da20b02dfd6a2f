//! File categorization by extension.
//!
//! A [`CategoryTable`] maps category names (which double as destination
//! folder names) to ordered lists of lowercase extensions. Lookup walks the
//! table in insertion order, so when two categories claim the same extension
//! the earlier one wins. An `Other` category always exists and catches
//! everything unclaimed.
//!
//! # Examples
//!
//! ```
//! use tidyrules::file_category::CategoryTable;
//!
//! let table = CategoryTable::default();
//! assert_eq!(table.categorize(".png"), "Images");
//! assert_eq!(table.categorize(".PDF"), "Documents");
//! assert_eq!(table.categorize(".unknown"), "Other");
//! ```

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Name of the catch-all category.
pub const OTHER: &str = "Other";

/// Name of the category whose files get EXIF-based subfolders.
pub const IMAGES: &str = "Images";

/// Ordered category → extensions table.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTable {
    categories: Vec<(String, Vec<String>)>,
}

impl CategoryTable {
    /// Creates a table holding only the `Other` category.
    pub fn empty() -> Self {
        Self {
            categories: vec![(OTHER.to_string(), Vec::new())],
        }
    }

    /// Populates the table with the standard mappings.
    fn populate_standard_mappings(&mut self) {
        self.insert(
            "Images",
            &[
                ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".tif", ".svg", ".webp", ".heic",
                ".heif", ".raw", ".cr2", ".nef", ".arw", ".orf", ".sr2", ".psd", ".ai", ".eps",
                ".indd",
            ],
        );
        self.insert(
            "Videos",
            &[
                ".mp4", ".mkv", ".flv", ".avi", ".mov", ".wmv", ".webm", ".mpg", ".mpeg", ".3gp",
                ".m4v",
            ],
        );
        self.insert(
            "Audio",
            &[".mp3", ".wav", ".aac", ".flac", ".ogg", ".m4a", ".wma", ".aiff"],
        );
        self.insert(
            "Documents",
            &[".pdf", ".doc", ".docx", ".txt", ".rtf", ".odt", ".pages", ".tex", ".md"],
        );
        self.insert("Spreadsheets", &[".xls", ".xlsx", ".csv", ".ods", ".numbers"]);
        self.insert("Presentations", &[".ppt", ".pptx", ".odp", ".key"]);
        self.insert(
            "Archives",
            &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz", ".iso", ".dmg"],
        );
        self.insert(
            "Executables",
            &[".exe", ".msi", ".bat", ".sh", ".app", ".jar", ".com"],
        );
        self.insert(
            "Code",
            &[
                ".py", ".js", ".ts", ".jsx", ".tsx", ".html", ".css", ".scss", ".java", ".cpp",
                ".c", ".h", ".cs", ".php", ".rb", ".go", ".swift", ".kt", ".json", ".xml",
                ".yaml", ".yml", ".sql",
            ],
        );
        self.insert("Web", &[".html", ".htm", ".css", ".js", ".php", ".asp", ".aspx"]);
        self.insert("Fonts", &[".ttf", ".otf", ".woff", ".woff2", ".eot"]);
        self.insert(
            "Data",
            &[
                ".csv", ".json", ".xml", ".yaml", ".yml", ".sql", ".db", ".sqlite", ".mdb",
            ],
        );
        self.insert("System", &[".dll", ".sys", ".drv", ".ini", ".cfg"]);
    }

    /// Adds or replaces a category.
    ///
    /// New categories are placed before `Other` so the catch-all stays last.
    /// Extensions are normalized to lowercase with a leading dot.
    pub fn insert<S: AsRef<str>>(&mut self, name: &str, extensions: &[S]) {
        let extensions: Vec<String> = extensions
            .iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| ext.len() > 1)
            .collect();

        if let Some((_, existing)) = self
            .categories
            .iter_mut()
            .find(|(existing, _)| existing == name)
        {
            *existing = extensions;
            return;
        }

        let position = self
            .categories
            .iter()
            .position(|(existing, _)| existing == OTHER)
            .unwrap_or(self.categories.len());
        self.categories
            .insert(position, (name.to_string(), extensions));
    }

    /// Removes a category. `Other` cannot be removed.
    ///
    /// Returns `true` if a category was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        if name == OTHER {
            return false;
        }
        let before = self.categories.len();
        self.categories.retain(|(existing, _)| existing != name);
        self.categories.len() != before
    }

    /// Returns the category for an extension (with or without a leading dot).
    ///
    /// # Examples
    ///
    /// ```
    /// use tidyrules::file_category::CategoryTable;
    ///
    /// let table = CategoryTable::default();
    /// assert_eq!(table.categorize("mp3"), "Audio");
    /// assert_eq!(table.categorize(""), "Other");
    /// ```
    pub fn categorize(&self, extension: &str) -> &str {
        let extension = normalize_extension(extension);
        if extension.len() <= 1 {
            return OTHER;
        }
        self.categories
            .iter()
            .find(|(_, extensions)| extensions.contains(&extension))
            .map(|(name, _)| name.as_str())
            .unwrap_or(OTHER)
    }

    /// Returns the extensions registered for a category.
    pub fn extensions(&self, name: &str) -> Option<&[String]> {
        self.categories
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, extensions)| extensions.as_slice())
    }

    /// Returns `true` if a directory name (case-insensitive) is a category folder.
    pub fn is_category_dir(&self, dir_name: &str) -> bool {
        self.categories
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(dir_name))
    }

    /// Iterates category names in table order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    fn ensure_other(&mut self) {
        if !self.categories.iter().any(|(name, _)| name == OTHER) {
            self.categories.push((OTHER.to_string(), Vec::new()));
        }
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.populate_standard_mappings();
        table
    }
}

/// Lowercases an extension and makes sure it starts with a dot.
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().to_lowercase();
    if trimmed.starts_with('.') {
        trimmed
    } else {
        format!(".{trimmed}")
    }
}

impl Serialize for CategoryTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for (name, extensions) in &self.categories {
            map.serialize_entry(name, extensions)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CategoryTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CategoryTableVisitor)
    }
}

/// Reads categories in document order so first-match semantics follow the file.
struct CategoryTableVisitor;

impl<'de> Visitor<'de> for CategoryTableVisitor {
    type Value = CategoryTable;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of category names to extension lists")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut table = CategoryTable {
            categories: Vec::with_capacity(access.size_hint().unwrap_or(0) + 1),
        };
        while let Some((name, extensions)) = access.next_entry::<String, Vec<String>>()? {
            let extensions = extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .filter(|ext| ext.len() > 1)
                .collect();
            table.categories.push((name, extensions));
        }
        table.ensure_other();
        Ok(table)
    }
}
