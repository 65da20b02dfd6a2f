//! Destination conflict handling.
//!
//! When a planned destination is already taken, the [`ConflictStrategy`]
//! decides between a numbered sibling name (`report (1).txt`) and skipping
//! the file. Nothing is ever overwritten.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Policy for a destination-path collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Append ` (N)` before the extension until the name is free.
    #[default]
    #[serde(alias = "overwrite")]
    Rename,
    /// Leave the source where it is.
    Skip,
}

/// Outcome of resolving a candidate destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing occupies the candidate; use it as is.
    Free(PathBuf),
    /// The candidate was taken; this numbered sibling is free.
    Renamed(PathBuf),
    /// The candidate was taken and the strategy is `skip`.
    Skip,
    /// Source and destination are the same file; there is nothing to do.
    InPlace,
}

impl Resolution {
    /// The final destination, if the action should go ahead.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Resolution::Free(path) | Resolution::Renamed(path) => Some(path),
            Resolution::Skip | Resolution::InPlace => None,
        }
    }
}

/// Resolves destination collisions against the disk and a set of paths
/// already claimed by the plan being built.
#[derive(Debug, Default)]
pub struct ConflictResolver {
    strategy: ConflictStrategy,
    reserved: HashSet<PathBuf>,
}

impl ConflictResolver {
    pub fn new(strategy: ConflictStrategy) -> Self {
        Self {
            strategy,
            reserved: HashSet::new(),
        }
    }

    pub fn strategy(&self) -> ConflictStrategy {
        self.strategy
    }

    /// Resolves `candidate` for a file currently at `source`.
    ///
    /// A path counts as taken if it exists on disk or was already returned by
    /// this resolver; every returned path is reserved so two files in one plan
    /// never land on the same name.
    pub fn resolve(&mut self, source: &Path, candidate: &Path) -> Resolution {
        if same_file(source, candidate) {
            return Resolution::InPlace;
        }

        let resolution = if !self.is_taken(candidate) {
            Resolution::Free(candidate.to_path_buf())
        } else {
            match self.strategy {
                ConflictStrategy::Skip => Resolution::Skip,
                ConflictStrategy::Rename => {
                    Resolution::Renamed(numbered_sibling(candidate, |path| self.is_taken(path)))
                }
            }
        };

        if let Some(path) = resolution.path() {
            self.reserved.insert(path.to_path_buf());
        }
        resolution
    }

    fn is_taken(&self, path: &Path) -> bool {
        path.exists() || self.reserved.contains(path)
    }
}

/// Returns `true` if two paths refer to the same file.
///
/// Compares canonical paths when both exist so `a/./b` and `a/b` agree.
pub fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Finds `stem (N).ext` next to `path` with the smallest free N ≥ 1.
pub fn numbered_sibling(path: &Path, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    suffixed_sibling(path, |count| format!(" ({count})"), is_taken)
}

/// Finds `stem (restored N).ext` next to `path` with the smallest free N ≥ 1.
pub fn restored_sibling(path: &Path) -> PathBuf {
    suffixed_sibling(path, |count| format!(" (restored {count})"), |p| p.exists())
}

fn suffixed_sibling(
    path: &Path,
    suffix: impl Fn(u32) -> String,
    is_taken: impl Fn(&Path) -> bool,
) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let (stem, extension) = split_name(path);

    let mut count = 1;
    loop {
        let candidate = parent.join(format!("{stem}{}{extension}", suffix(count)));
        if !is_taken(&candidate) {
            return candidate;
        }
        count += 1;
    }
}

/// Splits a file name into stem and extension (with its dot, or empty).
pub fn split_name(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_free_destination_is_unchanged() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("report.txt");
        let candidate = temp_dir.path().join("Docs").join("report.txt");

        let mut resolver = ConflictResolver::new(ConflictStrategy::Rename);
        assert_eq!(
            resolver.resolve(&source, &candidate),
            Resolution::Free(candidate.clone())
        );
    }

    #[test]
    fn test_rename_strategy_counts_up() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let docs = temp_dir.path().join("Docs");
        fs::create_dir(&docs).unwrap();
        fs::write(docs.join("report.txt"), "old").unwrap();
        let source = temp_dir.path().join("report.txt");

        let mut resolver = ConflictResolver::new(ConflictStrategy::Rename);
        assert_eq!(
            resolver.resolve(&source, &docs.join("report.txt")),
            Resolution::Renamed(docs.join("report (1).txt"))
        );

        fs::write(docs.join("report (1).txt"), "older").unwrap();
        let mut resolver = ConflictResolver::new(ConflictStrategy::Rename);
        assert_eq!(
            resolver.resolve(&source, &docs.join("report.txt")),
            Resolution::Renamed(docs.join("report (2).txt"))
        );
    }

    #[test]
    fn test_skip_strategy() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let existing = temp_dir.path().join("a.txt");
        fs::write(&existing, "x").unwrap();

        let mut resolver = ConflictResolver::new(ConflictStrategy::Skip);
        let source = temp_dir.path().join("sub").join("a.txt");
        assert_eq!(resolver.resolve(&source, &existing), Resolution::Skip);
    }

    #[test]
    fn test_same_file_is_in_place() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "x").unwrap();

        let mut resolver = ConflictResolver::new(ConflictStrategy::Rename);
        let dotted = temp_dir.path().join(".").join("a.txt");
        assert_eq!(resolver.resolve(&file, &dotted), Resolution::InPlace);
    }

    #[test]
    fn test_reserved_paths_are_taken() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let target = temp_dir.path().join("Docs").join("a.txt");

        let mut resolver = ConflictResolver::new(ConflictStrategy::Rename);
        let first = resolver.resolve(&temp_dir.path().join("x").join("a.txt"), &target);
        let second = resolver.resolve(&temp_dir.path().join("y").join("a.txt"), &target);

        assert_eq!(first, Resolution::Free(target.clone()));
        assert_eq!(
            second,
            Resolution::Renamed(temp_dir.path().join("Docs").join("a (1).txt"))
        );
    }

    #[test]
    fn test_restored_sibling() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let original = temp_dir.path().join("a.txt");
        fs::write(&original, "x").unwrap();
        fs::write(temp_dir.path().join("a (restored 1).txt"), "y").unwrap();

        assert_eq!(
            restored_sibling(&original),
            temp_dir.path().join("a (restored 2).txt")
        );
    }

    #[test]
    fn test_split_name_without_extension() {
        assert_eq!(
            split_name(Path::new("dir/Makefile")),
            ("Makefile".to_string(), String::new())
        );
        assert_eq!(
            split_name(Path::new("archive.tar.gz")),
            ("archive.tar".to_string(), ".gz".to_string())
        );
    }
}
