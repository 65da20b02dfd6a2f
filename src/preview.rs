//! Dry-run planning.
//!
//! A preview walks the tree, resolves every file and applies the conflict
//! strategy against the disk as it is now. Nothing is modified. The result
//! is a list of entries for display and a [`TransactionLog`] draft that the
//! caller may hand back for execution.

use crate::condition::ConditionEvaluator;
use crate::config::Settings;
use crate::conflict::{ConflictResolver, Resolution};
use crate::error::OrganizeResult;
use crate::events::EventSink;
use crate::metadata::Extractors;
use crate::resolver::RuleResolver;
use crate::rule::{ActionKind, ResolvedAction};
use crate::scan::ScanWalker;
use crate::transaction::{LogEntry, TransactionLog};
use std::fmt;
use std::path::{Path, PathBuf};

/// Progress is reported after this many files.
const PROGRESS_INTERVAL: usize = 100;

/// How a previewed action will be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewStatus {
    /// Goes ahead at the resolved destination.
    Planned,
    /// Goes ahead under a numbered name because the destination was taken.
    Renamed,
    /// Left alone because the destination was taken.
    Skipped,
    /// The file will be removed.
    Delete,
}

impl PreviewStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PreviewStatus::Planned => "",
            PreviewStatus::Renamed => "(Renamed - Conflict)",
            PreviewStatus::Skipped => "(Skipped - Exists)",
            PreviewStatus::Delete => "(Will be deleted)",
        }
    }
}

/// One line of a preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewEntry {
    pub action: ActionKind,
    pub source: PathBuf,
    /// Destination relative to the root, or `**DELETE**`.
    pub destination: String,
    pub status: PreviewStatus,
}

impl PreviewEntry {
    /// Whether this entry is part of the executable plan.
    pub fn is_planned(&self) -> bool {
        self.status != PreviewStatus::Skipped
    }
}

impl fmt::Display for PreviewEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.status.label();
        if label.is_empty() {
            f.write_str(&self.destination)
        } else {
            write!(f, "{} {}", self.destination, label)
        }
    }
}

/// A finished preview.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preview {
    pub entries: Vec<PreviewEntry>,
    pub plan: TransactionLog,
}

impl Preview {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct PreviewBuilder<'a> {
    settings: &'a Settings,
    extractors: &'a Extractors,
    sink: &'a EventSink,
}

impl<'a> PreviewBuilder<'a> {
    pub fn new(settings: &'a Settings, extractors: &'a Extractors, sink: &'a EventSink) -> Self {
        Self {
            settings,
            extractors,
            sink,
        }
    }

    /// Plans the organization of `root`.
    ///
    /// Files already at their destination are left out entirely. Files whose
    /// destination is taken under the `skip` strategy are listed but left out
    /// of the plan.
    ///
    /// # Errors
    ///
    /// Fails only if the root cannot be scanned.
    pub fn build(&self, root: &Path, recursive: bool) -> OrganizeResult<Preview> {
        self.sink.info("--- Generating Organization Preview ---");
        if recursive {
            self.sink.info("Scanning subfolders (recursive)...");
        } else {
            self.sink.info("Scanning root folder (non-recursive)...");
        }

        let files = ScanWalker::new(&self.settings.categories, recursive).collect(root, self.sink)?;
        let total = files.len();
        if total == 0 {
            self.sink.info("No files to preview.");
            return Ok(Preview::default());
        }
        self.sink
            .info(format!("Found {total} files. Generating preview..."));

        let evaluator = ConditionEvaluator::new(
            self.extractors,
            self.sink,
            self.settings.has_content_rules(),
        );
        let mut resolver = RuleResolver::new(self.settings, evaluator);
        let mut conflicts = ConflictResolver::new(self.settings.conflict_strategy);
        let mut preview = Preview::default();

        for (index, path) in files.iter().enumerate() {
            let action = resolver.resolve(path);
            if let Some(entry) = plan_entry(root, path, &action, &mut conflicts, &mut preview.plan) {
                preview.entries.push(entry);
            }

            let done = index + 1;
            if done % PROGRESS_INTERVAL == 0 || done == total {
                self.sink.progress(done, total);
            }
        }

        self.sink.info("--- Preview Generated ---");
        Ok(preview)
    }
}

/// Applies conflict resolution to one resolved action and records it.
///
/// Returns `None` when the file is already where it belongs.
fn plan_entry(
    root: &Path,
    source: &Path,
    action: &ResolvedAction,
    conflicts: &mut ConflictResolver,
    plan: &mut TransactionLog,
) -> Option<PreviewEntry> {
    let kind = action.kind();
    let Some(candidate) = action.destination(root) else {
        plan.push(LogEntry::deletion(source.to_path_buf()));
        return Some(PreviewEntry {
            action: kind,
            source: source.to_path_buf(),
            destination: "**DELETE**".to_string(),
            status: PreviewStatus::Delete,
        });
    };

    let (destination, status) = match conflicts.resolve(source, &candidate) {
        Resolution::InPlace => return None,
        Resolution::Skip => (candidate, PreviewStatus::Skipped),
        Resolution::Free(path) => (path, PreviewStatus::Planned),
        Resolution::Renamed(path) => (path, PreviewStatus::Renamed),
    };

    if status != PreviewStatus::Skipped {
        plan.push(LogEntry::relocation(
            source.to_path_buf(),
            destination.clone(),
            kind,
        ));
    }

    Some(PreviewEntry {
        action: kind,
        source: source.to_path_buf(),
        destination: relative_display(root, &destination),
        status,
    })
}

/// `path` relative to `root` for display, or the full path if outside it.
pub fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictStrategy;
    use crate::rule::{Condition, ConditionKind, Matcher, Rule};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn build(settings: &Settings, root: &Path, recursive: bool) -> Preview {
        let extractors = Extractors::new(Vec::new());
        let sink = EventSink::silent();
        PreviewBuilder::new(settings, &extractors, &sink)
            .build(root, recursive)
            .unwrap()
    }

    #[test]
    fn test_preview_does_not_touch_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("b.mp3"), "b").unwrap();

        let preview = build(&Settings::default(), root, false);

        assert!(root.join("a.txt").exists());
        assert!(!root.join("Documents").exists());
        assert_eq!(preview.plan.len(), 2);
        assert_eq!(
            preview
                .entries
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>(),
            vec![
                format!("{}", Path::new("Documents").join("a.txt").display()),
                format!("{}", Path::new("Audio").join("b.mp3").display()),
            ]
        );
    }

    #[test]
    fn test_preview_is_repeatable() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        for name in ["x.pdf", "y.png", "z.unknown"] {
            fs::write(root.join(name), name).unwrap();
        }

        let settings = Settings::default();
        assert_eq!(build(&settings, root, true), build(&settings, root, true));
    }

    #[test]
    fn test_skip_strategy_lists_but_does_not_plan() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir(root.join("Documents")).unwrap();
        fs::write(root.join("Documents/a.txt"), "old").unwrap();
        fs::write(root.join("a.txt"), "new").unwrap();

        let settings = Settings {
            conflict_strategy: ConflictStrategy::Skip,
            ..Settings::default()
        };
        let preview = build(&settings, root, false);

        assert_eq!(preview.entries.len(), 1);
        assert_eq!(preview.entries[0].status, PreviewStatus::Skipped);
        assert!(!preview.entries[0].is_planned());
        assert!(preview.plan.is_empty());
    }

    #[test]
    fn test_two_sources_never_share_a_destination() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("one")).unwrap();
        fs::create_dir_all(root.join("two")).unwrap();
        fs::write(root.join("one/a.txt"), "1").unwrap();
        fs::write(root.join("two/a.txt"), "2").unwrap();

        let preview = build(&Settings::default(), root, true);
        let targets: Vec<_> = preview
            .plan
            .iter()
            .filter_map(|entry| entry.target.clone())
            .collect();
        assert_eq!(
            targets,
            vec![
                root.join("Documents").join("a.txt"),
                root.join("Documents").join("a (1).txt"),
            ]
        );
        assert_eq!(preview.entries[1].status, PreviewStatus::Renamed);
    }

    #[test]
    fn test_file_already_in_place_is_dropped() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir(root.join("Reports")).unwrap();
        fs::write(root.join("Reports/report.txt"), "r").unwrap();

        let settings = Settings {
            rules: vec![Rule {
                name: "reports".to_string(),
                conditions: vec![Condition::new(
                    ConditionKind::FileName,
                    Matcher::Contains,
                    "report",
                )],
                action_type: ActionKind::Move,
                action_value: "Reports".to_string(),
            }],
            ..Settings::default()
        };
        let preview = build(&settings, root, true);
        assert!(preview.is_empty());
        assert!(preview.plan.is_empty());
    }

    #[test]
    fn test_delete_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.tmp"), "t").unwrap();
        fs::write(root.join("b.tmp"), "t").unwrap();

        let settings = Settings {
            rules: vec![Rule {
                name: "temp files".to_string(),
                conditions: vec![Condition::new(
                    ConditionKind::FileName,
                    Matcher::EndsWith,
                    ".tmp",
                )],
                action_type: ActionKind::Delete,
                action_value: String::new(),
            }],
            ..Settings::default()
        };
        let preview = build(&settings, root, false);

        assert_eq!(preview.plan.len(), 2);
        assert!(preview.plan.iter().all(|e| e.target.is_none()));
        assert_eq!(preview.entries[0].to_string(), "**DELETE** (Will be deleted)");
    }
}
