//! Organizer settings: categories, rules, and the conflict strategy.
//!
//! Settings are read from a TOML or JSON document (picked by file extension)
//! and handed to the engine as one value. The engine never edits them in
//! place; a new [`Settings`] replaces the old one wholesale.
//!
//! # Configuration File Format
//!
//! ```toml
//! conflict_strategy = "rename"
//!
//! [categories]
//! Images = [".jpg", ".png"]
//! Documents = [".pdf", ".txt"]
//!
//! [[rules]]
//! name = "Sort Reports"
//! action_type = "move"
//! action_value = "Documents/Reports"
//!
//! [[rules.conditions]]
//! type = "filename"
//! value = "report"
//! matcher = "contains"
//! ```
//!
//! A legacy `conflict_strategy = "overwrite"` is read as `"rename"`.

use crate::conflict::ConflictStrategy;
use crate::error::ConfigError;
use crate::file_category::CategoryTable;
use crate::rule::Rule;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_NAME: &str = ".tidyrules.toml";

/// Everything the engine needs to decide where a file goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,

    #[serde(default)]
    pub categories: CategoryTable,

    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            conflict_strategy: ConflictStrategy::Rename,
            categories: CategoryTable::default(),
            rules: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings, with fallback to defaults.
    ///
    /// Attempts to load settings in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.tidyrules.toml` in the current directory
    /// 3. Look for `tidyrules/config.toml` in the user's config directory
    /// 4. Fall back to default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file is found (or explicitly provided)
    /// but cannot be read or parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tidyrules").join("config.toml");
            if user_config.exists() {
                return Self::load_from_file(&user_config);
            }
        }

        tracing::debug!("No settings file found, using defaults");
        Ok(Self::default())
    }

    /// Load settings from a specific TOML or JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let settings = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_toml(&content)?
        };
        tracing::debug!(
            "Loaded {} categories and {} rules from {}",
            settings.categories.len(),
            settings.rules.len(),
            path.display()
        );
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Whether any rule inspects file contents.
    ///
    /// When this is false, content conditions are never evaluated and file
    /// bodies are never opened.
    pub fn has_content_rules(&self) -> bool {
        self.rules.iter().any(Rule::has_content_condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{ActionKind, ConditionKind};
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.conflict_strategy, ConflictStrategy::Rename);
        assert!(settings.rules.is_empty());
        assert!(!settings.has_content_rules());
        assert!(settings.categories.is_category_dir("Other"));
    }

    #[test]
    fn test_overwrite_is_migrated_to_rename() {
        let settings = Settings::from_json(r#"{"conflict_strategy": "overwrite"}"#).unwrap();
        assert_eq!(settings.conflict_strategy, ConflictStrategy::Rename);

        let settings = Settings::from_toml(r#"conflict_strategy = "skip""#).unwrap();
        assert_eq!(settings.conflict_strategy, ConflictStrategy::Skip);
    }

    #[test]
    fn test_load_toml_document() {
        let toml_src = r#"
            conflict_strategy = "skip"

            [categories]
            Pictures = ["JPG", ".png"]

            [[rules]]
            name = "Invoices"
            action_type = "move"
            action_value = "Finances/{YYYY}"

            [[rules.conditions]]
            type = "content"
            value = "invoice"
        "#;
        let settings = Settings::from_toml(toml_src).unwrap();

        assert_eq!(settings.categories.categorize(".jpg"), "Pictures");
        assert!(settings.categories.is_category_dir("other"));
        assert_eq!(settings.rules.len(), 1);
        assert_eq!(settings.rules[0].action_type, ActionKind::Move);
        assert_eq!(settings.rules[0].conditions[0].kind, ConditionKind::Content);
        assert!(settings.has_content_rules());
    }

    #[test]
    fn test_toml_categories_keep_document_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("settings.toml");
        fs::write(
            &path,
            r#"
            [categories]
            Spreadsheets = [".csv"]
            Data = [".csv", ".json"]
            Code = [".md"]
            Documents = [".md", ".txt"]
            "#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        let names: Vec<&str> = settings.categories.names().collect();
        assert_eq!(names, vec!["Spreadsheets", "Data", "Code", "Documents", "Other"]);
        assert_eq!(settings.categories.categorize(".csv"), "Spreadsheets");
        assert_eq!(settings.categories.categorize(".json"), "Data");
        assert_eq!(settings.categories.categorize(".md"), "Code");
    }

    #[test]
    fn test_load_json_file_by_extension() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
                "categories": {"Docs": [".txt"]},
                "rules": [{"name": "r", "conditions": [{"type": "filename", "value": "x"}],
                           "action_type": "delete", "action_value": ""}],
                "conflict_strategy": "rename"
            }"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.rules[0].action_type, ActionKind::Delete);
        assert_eq!(settings.categories.categorize("txt"), "Docs");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Settings::load(Some(Path::new("/non/existent/settings.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_invalid_document_is_an_error() {
        let result = Settings::from_toml("rules = 5");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }
}
