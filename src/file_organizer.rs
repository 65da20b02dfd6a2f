//! Plan execution.
//!
//! [`FileOrganizer::commit`] carries out an approved [`TransactionLog`] draft
//! item by item and records what actually happened as the new undo log. A
//! failing item is logged and skipped; the rest of the batch still runs.
//!
//! The filesystem primitives at the bottom of this module are shared with
//! undo and single-file organize.

use crate::backup;
use crate::conflict::{ConflictResolver, ConflictStrategy, Resolution};
use crate::error::{OrganizeError, OrganizeResult};
use crate::events::EventSink;
use crate::metadata::display_name;
use crate::preview::relative_display;
use crate::rule::ActionKind;
use crate::transaction::{LogEntry, TransactionLog};
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::Path;

/// Executes approved plans.
pub struct FileOrganizer<'a> {
    strategy: ConflictStrategy,
    sink: &'a EventSink,
}

impl<'a> FileOrganizer<'a> {
    pub fn new(strategy: ConflictStrategy, sink: &'a EventSink) -> Self {
        Self { strategy, sink }
    }

    /// Commits `plan` under `root` and returns the log of what was done.
    ///
    /// Destinations are checked against the disk again before each action,
    /// since the tree may have changed since the preview. The returned log
    /// is also saved at the root, replacing the previous one, unless nothing
    /// was committed.
    pub fn commit(&self, root: &Path, plan: &TransactionLog, backup_first: bool) -> TransactionLog {
        self.sink.info("--- Starting Organization ---");

        if backup_first {
            self.sink.info("Creating backup archive...");
            match backup::create_backup(root) {
                Ok(path) => self.sink.info(format!("Backup created: {}", path.display())),
                Err(e) => self.sink.error(format!("  - ERROR creating backup: {e}")),
            }
        }

        let total = plan.len();
        let mut conflicts = ConflictResolver::new(self.strategy);
        let mut committed = TransactionLog::new();

        for (index, entry) in plan.iter().enumerate() {
            match self.commit_entry(root, entry, &mut conflicts) {
                Ok(Some(done)) => committed.push(done),
                Ok(None) => {}
                Err(e) => self.sink.error(format!(
                    "  - ERROR during {} of '{}': {}",
                    entry.action,
                    display_name(&entry.original),
                    e
                )),
            }
            self.sink.progress(index + 1, total);
        }

        if committed.is_empty() {
            self.sink.info("No changes were made.");
        } else if let Err(e) = committed.save(root) {
            self.sink.error(format!("  - ERROR writing log file: {e}"));
        }

        self.sink.info("--- Organization Complete! ---");
        committed
    }

    fn commit_entry(
        &self,
        root: &Path,
        entry: &LogEntry,
        conflicts: &mut ConflictResolver,
    ) -> OrganizeResult<Option<LogEntry>> {
        let source = &entry.original;
        let rel_source = relative_display(root, source);

        if !source.exists() {
            self.sink.warn(format!(
                "  - WARN: Source no longer exists, skipping: {rel_source}"
            ));
            return Ok(None);
        }

        let Some(target) = &entry.target else {
            delete_file(source)?;
            self.sink.info(format!("Deleted '{rel_source}'"));
            return Ok(Some(LogEntry::deletion(source.clone())));
        };

        let destination = match conflicts.resolve(source, target) {
            Resolution::InPlace => return Ok(None),
            Resolution::Skip => {
                self.sink.warn(format!(
                    "  - SKIPPED (Conflict): '{}' already exists",
                    relative_display(root, target)
                ));
                return Ok(None);
            }
            Resolution::Free(path) => path,
            Resolution::Renamed(path) => {
                self.sink.warn(format!(
                    "  - WARN: '{}' appeared since the preview, using '{}'",
                    relative_display(root, target),
                    display_name(&path)
                ));
                path
            }
        };

        ensure_parent(&destination)?;
        let rel_destination = relative_display(root, &destination);
        match entry.action {
            ActionKind::Copy => {
                copy_file(source, &destination)?;
                self.sink
                    .info(format!("Copied '{rel_source}' -> '{rel_destination}'"));
            }
            ActionKind::Rename => {
                relocate(source, &destination)?;
                self.sink
                    .info(format!("Renamed '{rel_source}' -> '{rel_destination}'"));
            }
            ActionKind::Move | ActionKind::Delete => {
                relocate(source, &destination)?;
                self.sink
                    .info(format!("Moved '{rel_source}' -> '{rel_destination}'"));
            }
        }

        Ok(Some(LogEntry::relocation(
            source.clone(),
            destination,
            entry.action,
        )))
    }
}

/// Creates the parent directory of `path` if it is missing.
pub fn ensure_parent(path: &Path) -> OrganizeResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent).map_err(|e| OrganizeError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })
        }
        _ => Ok(()),
    }
}

/// Moves a file, falling back to copy and remove across filesystems.
pub fn relocate(from: &Path, to: &Path) -> OrganizeResult<()> {
    let move_failure = |e: io::Error| OrganizeError::FileMoveFailure {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    };

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_with_times(from, to).map_err(move_failure)?;
            if let Err(e) = fs::remove_file(from) {
                let _ = fs::remove_file(to);
                return Err(move_failure(e));
            }
            Ok(())
        }
        Err(e) => Err(move_failure(e)),
    }
}

/// Copies a file, keeping its permissions and timestamps.
pub fn copy_file(from: &Path, to: &Path) -> OrganizeResult<()> {
    copy_with_times(from, to).map_err(|e| OrganizeError::FileCopyFailure {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    })
}

pub fn delete_file(path: &Path) -> OrganizeResult<()> {
    fs::remove_file(path).map_err(|e| OrganizeError::FileDeleteFailure {
        path: path.to_path_buf(),
        source: e,
    })
}

fn copy_with_times(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    let metadata = fs::metadata(from)?;
    let mut times = FileTimes::new().set_modified(metadata.modified()?);
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    File::options().write(true).open(to)?.set_times(times)
}
