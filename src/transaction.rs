//! The transaction log: a plan before commit, the undo record after.
//!
//! Both share one shape, an ordered list of [`LogEntry`] values. On disk the
//! log is a JSON object keyed by destination path, with a synthetic
//! `deleted_<n>` key for deletions:
//!
//! ```json
//! {
//!     "/photos/Images/a.jpg": { "original": "/photos/a.jpg", "action": "move" },
//!     "deleted_1": { "original": "/photos/tmp.log", "action": "delete" }
//! }
//! ```
//!
//! Older logs stored a bare original path as the value; those entries are
//! read as moves.

use crate::error::{OrganizeError, OrganizeResult};
use crate::rule::ActionKind;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the hidden log file kept at the organized root.
pub const LOG_FILE_NAME: &str = ".tidyrules_log.json";

/// One planned or committed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Final destination. `None` for deletions.
    pub target: Option<PathBuf>,
    pub original: PathBuf,
    pub action: ActionKind,
}

impl LogEntry {
    pub fn relocation(original: PathBuf, target: PathBuf, action: ActionKind) -> Self {
        Self {
            target: Some(target),
            original,
            action,
        }
    }

    pub fn deletion(original: PathBuf) -> Self {
        Self {
            target: None,
            original,
            action: ActionKind::Delete,
        }
    }
}

/// An ordered set of actions keyed by destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionLog {
    entries: Vec<LogEntry>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, replacing any earlier one with the same target.
    pub fn push(&mut self, entry: LogEntry) {
        if let Some(target) = &entry.target
            && let Some(existing) = self
                .entries
                .iter_mut()
                .find(|e| e.target.as_ref() == Some(target))
        {
            *existing = entry;
            return;
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the path of the log file for a root directory.
    pub fn file_path(root: &Path) -> PathBuf {
        root.join(LOG_FILE_NAME)
    }

    pub fn exists(root: &Path) -> bool {
        Self::file_path(root).is_file()
    }

    /// Writes this log to the root, replacing any previous generation.
    pub fn save(&self, root: &Path) -> OrganizeResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            OrganizeError::TransactionLogWrite {
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("JSON serialization failed: {}", e),
                ),
            }
        })?;

        fs::write(Self::file_path(root), json)
            .map_err(|e| OrganizeError::TransactionLogWrite { source: e })
    }

    /// Reads the log stored at the root.
    ///
    /// # Errors
    ///
    /// [`OrganizeError::NoTransactionLog`] if there is no log, a read or
    /// format error if it cannot be used.
    pub fn load(root: &Path) -> OrganizeResult<Self> {
        let path = Self::file_path(root);
        if !path.exists() {
            return Err(OrganizeError::NoTransactionLog { path });
        }

        let json = fs::read_to_string(&path)
            .map_err(|e| OrganizeError::TransactionLogRead { source: e })?;
        serde_json::from_str(&json).map_err(|e| OrganizeError::InvalidTransactionLog {
            reason: format!("JSON parse error: {}", e),
        })
    }

    /// Removes the log file at the root, if any.
    pub fn delete(root: &Path) -> OrganizeResult<()> {
        let path = Self::file_path(root);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| OrganizeError::TransactionLogWrite { source: e })?;
        }
        Ok(())
    }
}

impl FromIterator<LogEntry> for TransactionLog {
    fn from_iter<I: IntoIterator<Item = LogEntry>>(iter: I) -> Self {
        let mut log = Self::new();
        for entry in iter {
            log.push(entry);
        }
        log
    }
}

impl<'a> IntoIterator for &'a TransactionLog {
    type Item = &'a LogEntry;
    type IntoIter = std::slice::Iter<'a, LogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    /// Older logs: the value is only the original path.
    Legacy(PathBuf),
    Record {
        #[serde(default)]
        original: PathBuf,
        #[serde(default)]
        action: ActionKind,
    },
}

impl Serialize for TransactionLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        let mut deletions = 0;
        for entry in &self.entries {
            let key = match &entry.target {
                Some(target) => target.to_string_lossy().into_owned(),
                None => {
                    deletions += 1;
                    format!("deleted_{deletions}")
                }
            };
            map.serialize_entry(
                &key,
                &StoredEntry::Record {
                    original: entry.original.clone(),
                    action: entry.action,
                },
            )?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TransactionLog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TransactionLogVisitor)
    }
}

struct TransactionLogVisitor;

impl<'de> Visitor<'de> for TransactionLogVisitor {
    type Value = TransactionLog;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of destination paths to log records")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, stored)) = access.next_entry::<String, StoredEntry>()? {
            let entry = match stored {
                StoredEntry::Legacy(original) => {
                    LogEntry::relocation(original, PathBuf::from(key), ActionKind::Move)
                }
                StoredEntry::Record {
                    original,
                    action: ActionKind::Delete,
                } => LogEntry::deletion(original),
                StoredEntry::Record { original, action } => {
                    LogEntry::relocation(original, PathBuf::from(key), action)
                }
            };
            entries.push(entry);
        }
        Ok(TransactionLog { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_preserves_order_and_deletions() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();

        let log: TransactionLog = vec![
            LogEntry::relocation(root.join("b.txt"), root.join("Docs/b.txt"), ActionKind::Move),
            LogEntry::deletion(root.join("x.tmp")),
            LogEntry::deletion(root.join("y.tmp")),
            LogEntry::relocation(root.join("a.jpg"), root.join("Images/a.jpg"), ActionKind::Copy),
        ]
        .into_iter()
        .collect();

        log.save(root).unwrap();
        let loaded = TransactionLog::load(root).unwrap();
        assert_eq!(loaded, log);
    }

    #[test]
    fn test_deletions_get_distinct_keys() {
        let log: TransactionLog = vec![
            LogEntry::deletion(PathBuf::from("/r/a")),
            LogEntry::deletion(PathBuf::from("/r/b")),
        ]
        .into_iter()
        .collect();

        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value["deleted_1"]["original"], "/r/a");
        assert_eq!(value["deleted_2"]["original"], "/r/b");
        assert_eq!(value["deleted_2"]["action"], "delete");
    }

    #[test]
    fn test_legacy_string_entries_are_moves() {
        let json = r#"{
            "/r/Docs/a.txt": "/r/a.txt",
            "/r/Docs/b.txt": {"original": "/r/b.txt"}
        }"#;
        let log: TransactionLog = serde_json::from_str(json).unwrap();

        assert_eq!(
            log.entries(),
            &[
                LogEntry::relocation(
                    PathBuf::from("/r/a.txt"),
                    PathBuf::from("/r/Docs/a.txt"),
                    ActionKind::Move
                ),
                LogEntry::relocation(
                    PathBuf::from("/r/b.txt"),
                    PathBuf::from("/r/Docs/b.txt"),
                    ActionKind::Move
                ),
            ]
        );
    }

    #[test]
    fn test_push_replaces_same_target() {
        let mut log = TransactionLog::new();
        log.push(LogEntry::relocation("/a".into(), "/t".into(), ActionKind::Move));
        log.push(LogEntry::relocation("/b".into(), "/t".into(), ActionKind::Copy));
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].original, PathBuf::from("/b"));
    }

    #[test]
    fn test_load_missing_log() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = TransactionLog::load(temp_dir.path());
        assert!(matches!(result, Err(OrganizeError::NoTransactionLog { .. })));
    }

    #[test]
    fn test_load_corrupt_log() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(TransactionLog::file_path(temp_dir.path()), "{not json").unwrap();
        let result = TransactionLog::load(temp_dir.path());
        assert!(matches!(
            result,
            Err(OrganizeError::InvalidTransactionLog { .. })
        ));
    }

    #[test]
    fn test_delete_log() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        TransactionLog::new().save(temp_dir.path()).unwrap();
        assert!(TransactionLog::exists(temp_dir.path()));
        TransactionLog::delete(temp_dir.path()).unwrap();
        assert!(!TransactionLog::exists(temp_dir.path()));
    }
}
