//! Undo of the last committed plan.
//!
//! The transaction log at the root is replayed newest entry first. Moves and
//! renames are reversed; copies and deletions are reported and left alone.
//! Nothing already sitting at an original path is overwritten: the restored
//! file gets a `(restored N)` name instead.

use crate::conflict::restored_sibling;
use crate::error::{OrganizeError, OrganizeResult};
use crate::events::EventSink;
use crate::file_organizer::{ensure_parent, relocate};
use crate::metadata::display_name;
use crate::rule::ActionKind;
use crate::transaction::{LogEntry, TransactionLog};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Represents the result of an undo operation.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files successfully restored.
    pub restored_files: usize,
    /// Files that could not be moved back, with the reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Entries that were not reverted (deletions, copies, missing files).
    pub skipped_files: Vec<(PathBuf, String)>,
    /// Empty destination directories removed afterwards.
    pub removed_dirs: usize,
}

impl UndoReport {
    /// Returns the total number of log entries processed.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    /// Returns true if every entry was either restored or intentionally skipped.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty()
    }
}

/// What happened to one log entry.
enum Outcome {
    Restored,
    Skipped(String),
}

/// Replays transaction logs in reverse.
pub struct UndoManager<'a> {
    sink: &'a EventSink,
}

impl<'a> UndoManager<'a> {
    pub fn new(sink: &'a EventSink) -> Self {
        Self { sink }
    }

    /// Reverts the last committed plan under `root`.
    ///
    /// Per-entry failures are collected in the report. The log file is
    /// removed once every entry has been processed.
    ///
    /// # Errors
    ///
    /// Fails without touching any file if the root does not exist or the log
    /// is missing or unreadable.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidyrules::events::EventSink;
    /// use tidyrules::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// let sink = EventSink::silent();
    /// match UndoManager::new(&sink).undo(Path::new("/path/to/directory")) {
    ///     Ok(report) => println!("Restored {} files", report.restored_files),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo(&self, root: &Path) -> OrganizeResult<UndoReport> {
        if !root.is_dir() {
            return Err(OrganizeError::InvalidBasePath {
                path: root.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "base path does not exist",
                ),
            });
        }

        self.sink.info("--- Starting De-organization ---");
        let log = TransactionLog::load(root)?;
        let total = log.len();
        let mut report = UndoReport::default();

        for (index, entry) in log.iter().rev().enumerate() {
            match self.restore_entry(entry) {
                Ok(Outcome::Restored) => report.restored_files += 1,
                Ok(Outcome::Skipped(reason)) => {
                    report.skipped_files.push((entry.original.clone(), reason))
                }
                Err(e) => {
                    let organized = entry.target.as_deref().unwrap_or(&entry.original);
                    self.sink.error(format!(
                        "  - ERROR moving back '{}': {}",
                        display_name(organized),
                        e
                    ));
                    report
                        .failed_restores
                        .push((entry.original.clone(), e.to_string()));
                }
            }
            self.sink.progress(index + 1, total);
        }

        report.removed_dirs = self.remove_empty_destinations(root, &log);

        TransactionLog::delete(root)?;
        self.sink.info("Removed log file.");
        self.sink.info("--- De-organization Complete! ---");
        Ok(report)
    }

    fn restore_entry(&self, entry: &LogEntry) -> OrganizeResult<Outcome> {
        let original = &entry.original;

        if entry.action == ActionKind::Delete {
            self.sink.info(format!(
                "  - SKIPPED Revert: Cannot undo deletion of '{}'",
                display_name(original)
            ));
            return Ok(Outcome::Skipped("deleted files cannot be restored".to_string()));
        }

        let Some(organized) = entry.target.as_deref().filter(|_| !original.as_os_str().is_empty())
        else {
            self.sink.warn(format!(
                "  - WARN: Invalid log entry skipped: {}",
                original.display()
            ));
            return Ok(Outcome::Skipped("invalid log entry".to_string()));
        };

        if !organized.exists() {
            self.sink.warn(format!(
                "  - WARN: Organized file not found, skipping: {}",
                organized.display()
            ));
            return Ok(Outcome::Skipped("file not found at expected location".to_string()));
        }

        if entry.action == ActionKind::Copy {
            self.sink.info(format!(
                "  - INFO: Original action was 'copy', leaving '{}' in place.",
                display_name(organized)
            ));
            return Ok(Outcome::Skipped("copies are left in place".to_string()));
        }

        ensure_parent(original)?;
        let restore_to = if original.exists() {
            let renamed = restored_sibling(original);
            self.sink.warn(format!(
                "  - WARN: Original exists, renaming restored file to {}",
                display_name(&renamed)
            ));
            renamed
        } else {
            original.clone()
        };

        relocate(organized, &restore_to)?;
        self.sink
            .info(format!("'{}' <- Moved back", display_name(&restore_to)));
        Ok(Outcome::Restored)
    }

    /// Removes move and rename destination directories left empty, deepest
    /// first, along with emptied ancestors up to (not including) the root.
    fn remove_empty_destinations(&self, root: &Path, log: &TransactionLog) -> usize {
        let mut candidates = BTreeSet::new();
        for entry in log {
            if !matches!(entry.action, ActionKind::Move | ActionKind::Rename) {
                continue;
            }
            let Some(mut dir) = entry.target.as_deref().and_then(Path::parent) else {
                continue;
            };
            while dir.starts_with(root) && dir != root {
                candidates.insert(dir.to_path_buf());
                match dir.parent() {
                    Some(parent) => dir = parent,
                    None => break,
                }
            }
        }

        let mut ordered: Vec<PathBuf> = candidates.into_iter().collect();
        ordered.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));

        let mut removed = 0;
        for dir in ordered {
            let is_empty = fs::read_dir(&dir)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if !is_empty {
                continue;
            }
            match fs::remove_dir(&dir) {
                Ok(()) => {
                    removed += 1;
                    self.sink.info(format!(
                        "Removed empty directory: {}",
                        display_name(&dir)
                    ));
                }
                Err(e) => self.sink.warn(format!(
                    "  - WARN: Could not remove dir {}: {}",
                    display_name(&dir),
                    e
                )),
            }
        }
        removed
    }
}
