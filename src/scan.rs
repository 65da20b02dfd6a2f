//! Candidate file enumeration.
//!
//! The walk is top-down and sorted by file name so plans come out the same
//! on every run. Category folders directly under the root are pruned, which
//! keeps already-sorted output from being organized a second time.

use crate::error::{OrganizeError, OrganizeResult};
use crate::events::EventSink;
use crate::file_category::CategoryTable;
use crate::transaction::LOG_FILE_NAME;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Returns `true` for file names the organizer never touches: hidden files
/// and its own transaction log.
pub fn is_ignored_name(name: &str) -> bool {
    name.starts_with('.') || name == LOG_FILE_NAME
}

/// Returns `true` for office lock files such as `~$report.docx`.
pub fn is_lock_file(name: &str) -> bool {
    name.starts_with("~$")
}

/// Enumerates files to organize under a root.
pub struct ScanWalker<'a> {
    categories: &'a CategoryTable,
    recursive: bool,
}

impl<'a> ScanWalker<'a> {
    pub fn new(categories: &'a CategoryTable, recursive: bool) -> Self {
        Self {
            categories,
            recursive,
        }
    }

    /// Lazily walks `root`, yielding candidate files in name order.
    ///
    /// # Errors
    ///
    /// Fails up front if the root cannot be listed. Errors reading entries
    /// below the root are yielded as items.
    pub fn walk<'r>(
        &'r self,
        root: &'r Path,
    ) -> OrganizeResult<impl Iterator<Item = walkdir::Result<PathBuf>> + 'r> {
        fs::read_dir(root).map_err(|e| OrganizeError::InvalidBasePath {
            path: root.to_path_buf(),
            source: e,
        })?;

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(root)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| self.should_descend(root, entry));

        Ok(walker.filter_map(|entry| match entry {
            Ok(entry) if is_candidate(&entry) => Some(Ok(entry.into_path())),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }))
    }

    /// Collects every candidate file, logging unreadable subdirectories.
    pub fn collect(&self, root: &Path, sink: &EventSink) -> OrganizeResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for item in self.walk(root)? {
            match item {
                Ok(path) => files.push(path),
                Err(e) if e.depth() == 0 => {
                    return Err(OrganizeError::ScanFailed {
                        path: root.to_path_buf(),
                        source: e,
                    });
                }
                Err(e) => sink.warn(format!("  - WARN: Skipping unreadable entry: {e}")),
            }
        }
        Ok(files)
    }

    /// Hidden directories and anything inside a top-level category folder
    /// are not visited.
    fn should_descend(&self, root: &Path, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        if entry.file_type().is_dir() && entry.file_name().to_string_lossy().starts_with('.') {
            return false;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            return true;
        };
        let first = relative
            .components()
            .next()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .unwrap_or_default();

        // A file named like a category at the root is still a candidate.
        let inside_category = entry.depth() > 1 || entry.file_type().is_dir();
        !(inside_category && self.categories.is_category_dir(&first))
    }
}

fn is_candidate(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    if is_ignored_name(&name) || is_lock_file(&name) {
        return false;
    }
    // Symlinks count when they point at a regular file.
    entry.file_type().is_file() || entry.path().is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn relative(root: &Path, files: Vec<PathBuf>) -> Vec<String> {
        files
            .iter()
            .map(|path| {
                path.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    fn build_tree(root: &Path) {
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.jpg"), "a").unwrap();
        fs::write(root.join(".hidden"), "h").unwrap();
        fs::write(root.join("~$draft.docx"), "lock").unwrap();
        fs::write(root.join(LOG_FILE_NAME), "{}").unwrap();
        fs::create_dir_all(root.join("Images/2023-01")).unwrap();
        fs::write(root.join("Images/sorted.jpg"), "s").unwrap();
        fs::write(root.join("Images/2023-01/deep.jpg"), "d").unwrap();
        fs::create_dir_all(root.join("projects/sub")).unwrap();
        fs::write(root.join("projects/sub/notes.md"), "n").unwrap();
        fs::write(root.join("projects/plan.txt"), "p").unwrap();
    }

    #[test]
    fn test_non_recursive_scans_root_only() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        build_tree(temp_dir.path());
        let categories = CategoryTable::default();

        let files = ScanWalker::new(&categories, false)
            .collect(temp_dir.path(), &EventSink::silent())
            .unwrap();
        assert_eq!(relative(temp_dir.path(), files), vec!["a.jpg", "b.txt"]);
    }

    #[test]
    fn test_recursive_prunes_category_folders() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        build_tree(temp_dir.path());
        let categories = CategoryTable::default();

        let files = ScanWalker::new(&categories, true)
            .collect(temp_dir.path(), &EventSink::silent())
            .unwrap();
        assert_eq!(
            relative(temp_dir.path(), files),
            vec!["a.jpg", "b.txt", "projects/plan.txt", "projects/sub/notes.md"]
        );
    }

    #[test]
    fn test_category_match_is_case_insensitive() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("documents")).unwrap();
        fs::write(temp_dir.path().join("documents/x.pdf"), "x").unwrap();
        let categories = CategoryTable::default();

        let files = ScanWalker::new(&categories, true)
            .collect(temp_dir.path(), &EventSink::silent())
            .unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_unreadable_root_is_fatal() {
        let categories = CategoryTable::default();
        let result = ScanWalker::new(&categories, true)
            .collect(Path::new("/non/existent/root"), &EventSink::silent());
        assert!(matches!(result, Err(OrganizeError::InvalidBasePath { .. })));
    }
}
