//! The organizer engine and its worker thread.
//!
//! [`Engine`] owns the settings and the metadata providers and runs one
//! operation at a time. [`Worker`] puts an engine on a dedicated thread and
//! feeds it [`Request`]s through a channel; results come back as
//! [`Event`]s. Every request except [`Request::ReplaceSettings`] and
//! [`Request::Shutdown`] ends with exactly one [`Event::Finished`].

use crate::condition::ConditionEvaluator;
use crate::config::Settings;
use crate::conflict::{ConflictResolver, Resolution};
use crate::duplicates::{DuplicateScanner, DuplicateSets};
use crate::error::OrganizeResult;
use crate::events::{Event, EventSink};
use crate::file_organizer::{FileOrganizer, copy_file, delete_file, ensure_parent, relocate};
use crate::maintenance::{self, FolderStats};
use crate::metadata::{Extractors, display_name};
use crate::preview::{Preview, PreviewBuilder, relative_display};
use crate::resolver::RuleResolver;
use crate::rule::ActionKind;
use crate::scan::{is_ignored_name, is_lock_file};
use crate::transaction::TransactionLog;
use crate::undo::{UndoManager, UndoReport};
use crossbeam_channel::{Receiver, Sender};
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Wait before reading a file reported by a watcher.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Work for the engine.
#[derive(Debug, Clone)]
pub enum Request {
    Preview {
        root: PathBuf,
        backup_first: bool,
        recursive: bool,
    },
    Execute {
        root: PathBuf,
        plan: TransactionLog,
        backup_first: bool,
    },
    Undo {
        root: PathBuf,
    },
    DuplicateScan {
        root: PathBuf,
    },
    OrganizeFile {
        path: PathBuf,
    },
    FolderStats {
        root: PathBuf,
    },
    CleanupEmptyFolders {
        root: PathBuf,
    },
    /// Swap in a whole new configuration.
    ReplaceSettings(Settings),
    Shutdown,
}

pub struct Engine {
    settings: Settings,
    extractors: Extractors,
    sink: EventSink,
    settle_delay: Duration,
}

impl Engine {
    pub fn new(settings: Settings, sink: EventSink) -> Self {
        Self {
            settings,
            extractors: Extractors::standard(),
            sink,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Replaces the metadata providers.
    pub fn with_extractors(mut self, extractors: Extractors) -> Self {
        self.extractors = extractors;
        self
    }

    /// Sets how long single-file organize waits before touching the file.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replaces categories, rules and conflict strategy in one step.
    pub fn replace_settings(&mut self, settings: Settings) {
        tracing::debug!(
            "Replacing settings: {} categories, {} rules",
            settings.categories.len(),
            settings.rules.len()
        );
        self.settings = settings;
    }

    /// Plans the organization of `root` without changing anything.
    pub fn preview(&self, root: &Path, recursive: bool) -> OrganizeResult<Preview> {
        PreviewBuilder::new(&self.settings, &self.extractors, &self.sink).build(root, recursive)
    }

    /// Commits an approved plan and returns what was actually done.
    pub fn execute(&self, root: &Path, plan: &TransactionLog, backup_first: bool) -> TransactionLog {
        FileOrganizer::new(self.settings.conflict_strategy, &self.sink).commit(
            root,
            plan,
            backup_first,
        )
    }

    /// Reverts the last committed plan under `root`.
    pub fn undo(&self, root: &Path) -> OrganizeResult<UndoReport> {
        UndoManager::new(&self.sink).undo(root)
    }

    pub fn find_duplicates(&self, root: &Path) -> OrganizeResult<DuplicateSets> {
        DuplicateScanner::new(&self.sink).scan(root)
    }

    pub fn folder_stats(&self, root: &Path) -> OrganizeResult<FolderStats> {
        maintenance::folder_stats(root, &self.sink)
    }

    pub fn cleanup_empty_folders(&self, root: &Path) -> OrganizeResult<usize> {
        maintenance::cleanup_empty_folders(root, &self.sink)
    }

    /// Organizes one newly created file relative to its own directory.
    ///
    /// Waits the settle delay first so the producer can finish writing.
    /// Returns a short summary when something was done, `None` when the
    /// file was ignored, already in place, or skipped on conflict. No
    /// transaction log is written.
    pub fn organize_single_file(&self, path: &Path) -> OrganizeResult<Option<String>> {
        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }

        let name = display_name(path);
        if !path.is_file() || is_ignored_name(&name) || is_lock_file(&name) {
            tracing::debug!("Ignoring watched path {}", path.display());
            return Ok(None);
        }
        let Some(root) = path.parent() else {
            return Ok(None);
        };

        self.sink.info(format!("Watcher: New file - {name}"));

        // A fresh evaluator per file starts with an empty metadata cache.
        let evaluator = ConditionEvaluator::new(
            &self.extractors,
            &self.sink,
            self.settings.has_content_rules(),
        );
        let action = RuleResolver::new(&self.settings, evaluator).resolve(path);

        let Some(candidate) = action.destination(root) else {
            delete_file(path)?;
            self.sink.info(format!("  - DELETED '{name}' by rule."));
            return Ok(Some(format!("Deleted: {name}")));
        };

        let destination = match ConflictResolver::new(self.settings.conflict_strategy)
            .resolve(path, &candidate)
        {
            Resolution::InPlace => {
                self.sink
                    .info("  - INFO: File is already in place, skipped.");
                return Ok(None);
            }
            Resolution::Skip => {
                self.sink.info("  - SKIPPED (Conflict)");
                return Ok(None);
            }
            Resolution::Free(destination) => destination,
            Resolution::Renamed(destination) => {
                self.sink.info(format!(
                    "  - RENAMED (Conflict) to '{}'",
                    display_name(&destination)
                ));
                destination
            }
        };

        ensure_parent(&destination)?;
        let final_name = display_name(&destination);
        let folder = destination
            .parent()
            .map(|dir| relative_display(root, dir))
            .unwrap_or_default();
        let summary = match action.kind() {
            ActionKind::Copy => {
                copy_file(path, &destination)?;
                self.sink.info(format!("  - Copied to '{folder}'"));
                format!("Copied: {final_name}")
            }
            ActionKind::Rename => {
                relocate(path, &destination)?;
                self.sink.info(format!("  - Renamed to '{final_name}'"));
                format!("Renamed: {final_name}")
            }
            ActionKind::Move | ActionKind::Delete => {
                relocate(path, &destination)?;
                self.sink.info(format!("  - Moved to '{folder}'"));
                format!("Organized: {final_name}")
            }
        };
        Ok(Some(summary))
    }

    /// Runs one request and reports through the sink.
    ///
    /// Returns `false` once the engine should stop.
    pub fn handle(&mut self, request: Request) -> bool {
        match request {
            Request::ReplaceSettings(settings) => {
                self.replace_settings(settings);
                return true;
            }
            Request::Shutdown => return false,
            Request::Preview {
                root,
                backup_first,
                recursive,
            } => match self.preview(&root, recursive) {
                Ok(Preview { entries, plan }) => self.sink.emit(Event::PreviewReady {
                    entries,
                    plan,
                    backup_first,
                }),
                Err(e) => self.sink.error(format!("Error scanning folder: {e}")),
            },
            Request::Execute {
                root,
                plan,
                backup_first,
            } => {
                self.execute(&root, &plan, backup_first);
            }
            Request::Undo { root } => match self.undo(&root) {
                Ok(report) => self.sink.info(format!(
                    "Undo summary: {} restored, {} skipped, {} failed.",
                    report.restored_files,
                    report.skipped_files.len(),
                    report.failed_restores.len()
                )),
                Err(e) => self.sink.error(format!("ERROR: {e}")),
            },
            Request::DuplicateScan { root } => match self.find_duplicates(&root) {
                Ok(sets) => self.sink.emit(Event::DuplicatesFound(sets)),
                Err(e) => self.sink.error(format!("Error scanning for duplicates: {e}")),
            },
            Request::OrganizeFile { path } => match self.organize_single_file(&path) {
                Ok(Some(summary)) => self.sink.emit(Event::SingleFileOrganized(summary)),
                Ok(None) => {}
                Err(e) => self.sink.error(format!(
                    "  - ERROR organizing {}: {}",
                    display_name(&path),
                    e
                )),
            },
            Request::FolderStats { root } => match self.folder_stats(&root) {
                Ok(stats) => self.sink.emit(Event::FolderStats(stats)),
                Err(e) => self.sink.error(format!("Error scanning folder stats: {e}")),
            },
            Request::CleanupEmptyFolders { root } => {
                if let Err(e) = self.cleanup_empty_folders(&root) {
                    self.sink.error(format!("Error during cleanup: {e}"));
                }
            }
        }
        self.sink.emit(Event::Finished);
        true
    }
}

/// An [`Engine`] running on its own thread.
///
/// Requests are processed strictly in submission order. Dropping the worker
/// shuts the thread down after the request in progress.
pub struct Worker {
    requests: Sender<Request>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Starts a worker with the standard providers and settle delay.
    pub fn spawn(settings: Settings) -> io::Result<(Worker, Receiver<Event>)> {
        Self::spawn_with(move |sink| Engine::new(settings, sink))
    }

    /// Starts a worker around an engine built on the worker thread.
    pub fn spawn_with<F>(build: F) -> io::Result<(Worker, Receiver<Event>)>
    where
        F: FnOnce(EventSink) -> Engine + Send + 'static,
    {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<Request>();

        let thread = thread::Builder::new()
            .name("tidyrules-engine".to_string())
            .spawn(move || {
                let mut engine = build(EventSink::new(event_tx));
                for request in request_rx {
                    if !engine.handle(request) {
                        break;
                    }
                }
                tracing::debug!("Engine worker stopped");
            })?;

        Ok((
            Worker {
                requests: request_tx,
                thread: Some(thread),
            },
            event_rx,
        ))
    }

    /// Queues a request. Returns `false` if the worker has stopped.
    pub fn submit(&self, request: Request) -> bool {
        self.requests.send(request).is_ok()
    }

    /// Stops the worker and waits for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.requests.send(Request::Shutdown);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("Engine worker panicked");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Condition, ConditionKind, Matcher, Rule};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn quiet_engine(settings: Settings) -> Engine {
        Engine::new(settings, EventSink::silent())
            .with_extractors(Extractors::new(Vec::new()))
            .with_settle_delay(Duration::ZERO)
    }

    fn rule(action: ActionKind, contains: &str, value: &str) -> Rule {
        Rule {
            name: format!("{action} {contains}"),
            conditions: vec![Condition::new(
                ConditionKind::FileName,
                Matcher::Contains,
                contains,
            )],
            action_type: action,
            action_value: value.to_string(),
        }
    }

    #[test]
    fn test_single_file_moves_relative_to_its_folder() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let inbox = temp_dir.path().join("inbox");
        fs::create_dir(&inbox).unwrap();
        fs::write(inbox.join("song.mp3"), "m").unwrap();

        let engine = quiet_engine(Settings::default());
        let summary = engine.organize_single_file(&inbox.join("song.mp3")).unwrap();

        assert_eq!(summary.as_deref(), Some("Organized: song.mp3"));
        assert!(inbox.join("Audio/song.mp3").exists());
        assert!(!TransactionLog::exists(&inbox));
    }

    #[test]
    fn test_single_file_ignores_hidden_and_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join(".partial"), "x").unwrap();

        let engine = quiet_engine(Settings::default());
        assert_eq!(
            engine
                .organize_single_file(&temp_dir.path().join(".partial"))
                .unwrap(),
            None
        );
        assert_eq!(
            engine
                .organize_single_file(&temp_dir.path().join("missing.txt"))
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_single_file_delete_and_rename() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("junk.tmp"), "x").unwrap();
        fs::write(root.join("scan.pdf"), "x").unwrap();

        let settings = Settings {
            rules: vec![
                rule(ActionKind::Delete, ".tmp", ""),
                rule(ActionKind::Rename, "scan", "document_{SeqNum}"),
            ],
            ..Settings::default()
        };
        let engine = quiet_engine(settings);

        assert_eq!(
            engine.organize_single_file(&root.join("junk.tmp")).unwrap(),
            Some("Deleted: junk.tmp".to_string())
        );
        assert!(!root.join("junk.tmp").exists());

        assert_eq!(
            engine.organize_single_file(&root.join("scan.pdf")).unwrap(),
            Some("Renamed: document_1.pdf".to_string())
        );
        assert!(root.join("document_1.pdf").exists());
    }

    #[test]
    fn test_replace_settings_is_wholesale() {
        let mut engine = quiet_engine(Settings::default());
        let settings = Settings {
            rules: vec![rule(ActionKind::Move, "x", "X")],
            ..Settings::default()
        };
        assert!(engine.handle(Request::ReplaceSettings(settings.clone())));
        assert_eq!(engine.settings(), &settings);
        assert!(!engine.handle(Request::Shutdown));
    }

    #[test]
    fn test_worker_preview_then_execute() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        fs::write(root.join("a.txt"), "a").unwrap();

        let (worker, events) = Worker::spawn_with(|sink| {
            Engine::new(Settings::default(), sink).with_settle_delay(Duration::ZERO)
        })
        .unwrap();

        assert!(worker.submit(Request::Preview {
            root: root.clone(),
            backup_first: false,
            recursive: false,
        }));

        let mut plan = None;
        for event in events.iter() {
            match event {
                Event::PreviewReady { plan: p, .. } => plan = Some(p),
                Event::Finished => break,
                _ => {}
            }
        }
        let plan = plan.expect("preview result");
        assert_eq!(plan.len(), 1);

        worker.submit(Request::Execute {
            root: root.clone(),
            plan,
            backup_first: false,
        });
        for event in events.iter() {
            if matches!(event, Event::Finished) {
                break;
            }
        }
        assert!(root.join("Documents/a.txt").exists());

        worker.shutdown();
    }

    #[test]
    fn test_worker_reports_fatal_errors_and_finishes() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let (worker, events) = Worker::spawn(Settings::default()).unwrap();

        worker.submit(Request::Undo {
            root: temp_dir.path().to_path_buf(),
        });

        let mut saw_error = false;
        for event in events.iter() {
            match event {
                Event::Log {
                    level: crate::events::LogLevel::Error,
                    message,
                } => saw_error = message.contains("Log file not found"),
                Event::Finished => break,
                _ => {}
            }
        }
        assert!(saw_error);
    }
}
