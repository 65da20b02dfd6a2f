//! Folder statistics and empty-folder cleanup.

use crate::error::{OrganizeError, OrganizeResult};
use crate::events::EventSink;
use crate::preview::relative_display;
use crate::scan::is_ignored_name;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// File count, total size and extension histogram of a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderStats {
    pub file_count: usize,
    pub total_bytes: u64,
    /// Lowercase extension with its dot → number of files.
    pub extensions: BTreeMap<String, usize>,
}

impl FolderStats {
    /// `x.xx GB` from one GiB up, `x.xx MB` below.
    pub fn size_display(&self) -> String {
        let bytes = self.total_bytes as f64;
        if bytes >= GIB {
            format!("{:.2} GB", bytes / GIB)
        } else {
            format!("{:.2} MB", bytes / MIB)
        }
    }

    /// Extensions sorted by descending count, ties by name.
    pub fn top_extensions(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .extensions
            .iter()
            .map(|(ext, count)| (ext.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked
    }
}

/// Walks `root` and tallies every non-hidden file.
pub fn folder_stats(root: &Path, sink: &EventSink) -> OrganizeResult<FolderStats> {
    fs::read_dir(root).map_err(|e| OrganizeError::InvalidBasePath {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut stats = FolderStats::default();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                sink.warn(format!("  - WARN: Skipping unreadable entry: {e}"));
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy();
        if !entry.file_type().is_file() || is_ignored_name(&name) {
            continue;
        }

        stats.file_count += 1;
        if let Ok(metadata) = entry.metadata() {
            stats.total_bytes += metadata.len();
        }
        if let Some(ext) = entry.path().extension() {
            let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
            *stats.extensions.entry(ext).or_insert(0) += 1;
        }
    }
    Ok(stats)
}

/// Removes every empty directory below `root`, children first.
///
/// The root itself is never removed. Returns the number of directories
/// removed.
pub fn cleanup_empty_folders(root: &Path, sink: &EventSink) -> OrganizeResult<usize> {
    sink.info("--- Scanning for empty folders... ---");
    fs::read_dir(root).map_err(|e| OrganizeError::InvalidBasePath {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut removed = 0;
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let Ok(entry) = entry else {
            continue;
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let is_empty = fs::read_dir(path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty {
            continue;
        }

        match fs::remove_dir(path) {
            Ok(()) => {
                removed += 1;
                sink.info(format!(
                    "Removed empty folder: {}",
                    relative_display(root, path)
                ));
            }
            Err(e) => sink.warn(format!(
                "  - WARN: Could not remove {}: {}",
                relative_display(root, path),
                e
            )),
        }
    }

    if removed == 0 {
        sink.info("No empty folders found.");
    } else {
        sink.info(format!("--- Removed {removed} empty folders. ---"));
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::LOG_FILE_NAME;
    use tempfile::TempDir;

    #[test]
    fn test_folder_stats() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("a.TXT"), "12345").unwrap();
        fs::write(root.join("sub/b.txt"), "123").unwrap();
        fs::write(root.join("Makefile"), "1").unwrap();
        fs::write(root.join(".hidden"), "ignored").unwrap();
        fs::write(root.join(LOG_FILE_NAME), "{}").unwrap();

        let stats = folder_stats(root, &EventSink::silent()).unwrap();
        assert_eq!(stats.file_count, 3);
        assert_eq!(stats.total_bytes, 9);
        assert_eq!(stats.extensions.get(".txt"), Some(&2));
        assert_eq!(stats.extensions.len(), 1);
        assert_eq!(stats.top_extensions(), vec![(".txt", 2)]);
    }

    #[test]
    fn test_size_display() {
        let mut stats = FolderStats::default();
        stats.total_bytes = 3 * 1024 * 1024 / 2;
        assert_eq!(stats.size_display(), "1.50 MB");
        stats.total_bytes = 2 * 1024 * 1024 * 1024;
        assert_eq!(stats.size_display(), "2.00 GB");
    }

    #[test]
    fn test_cleanup_removes_nested_empty_folders() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("keep")).unwrap();
        fs::write(root.join("keep/file.txt"), "x").unwrap();

        let removed = cleanup_empty_folders(root, &EventSink::silent()).unwrap();

        assert_eq!(removed, 3);
        assert!(!root.join("a").exists());
        assert!(root.join("keep/file.txt").exists());
        assert!(root.exists());
    }

    #[test]
    fn test_cleanup_on_empty_root_keeps_root() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let removed = cleanup_empty_folders(temp_dir.path(), &EventSink::silent()).unwrap();
        assert_eq!(removed, 0);
        assert!(temp_dir.path().exists());
    }
}
