//! Content-hash duplicate detection.
//!
//! Unlike organizing, the duplicate scan looks inside category folders too:
//! a copy that was already sorted is still a copy.

use crate::error::{OrganizeError, OrganizeResult};
use crate::events::EventSink;
use crate::metadata::display_name;
use crate::scan::is_ignored_name;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read size while hashing.
const CHUNK_SIZE: usize = 128 * 1024;

/// Hex SHA-256 → files with that content, in walk order.
pub type DuplicateSets = BTreeMap<String, Vec<PathBuf>>;

pub struct DuplicateScanner<'a> {
    sink: &'a EventSink,
}

impl<'a> DuplicateScanner<'a> {
    pub fn new(sink: &'a EventSink) -> Self {
        Self { sink }
    }

    /// Hashes every file under `root` and returns groups of two or more
    /// identical files.
    ///
    /// Unreadable files are logged and left out.
    pub fn scan(&self, root: &Path) -> OrganizeResult<DuplicateSets> {
        self.sink.info("--- Starting Duplicate File Scan ---");
        fs::read_dir(root).map_err(|e| OrganizeError::InvalidBasePath {
            path: root.to_path_buf(),
            source: e,
        })?;

        let files = self.list_files(root)?;
        let total = files.len();
        if total == 0 {
            self.sink.info("No files found to scan.");
            return Ok(DuplicateSets::new());
        }

        let mut by_hash: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for (index, path) in files.into_iter().enumerate() {
            match hash_file(&path) {
                Ok(hash) => by_hash.entry(hash).or_default().push(path),
                Err(e) => self
                    .sink
                    .warn(format!("Could not read {}: {}", display_name(&path), e)),
            }
            self.sink.progress(index + 1, total);
        }

        by_hash.retain(|_, paths| paths.len() > 1);
        self.sink.info(format!(
            "--- Duplicate Scan Complete: Found {} sets of duplicates. ---",
            by_hash.len()
        ));
        Ok(by_hash)
    }

    fn list_files(&self, root: &Path) -> OrganizeResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file()
                        && !is_ignored_name(&entry.file_name().to_string_lossy())
                    {
                        files.push(entry.into_path());
                    }
                }
                Err(e) if e.depth() == 0 => {
                    return Err(OrganizeError::ScanFailed {
                        path: root.to_path_buf(),
                        source: e,
                    });
                }
                Err(e) => self
                    .sink
                    .warn(format!("  - WARN: Skipping unreadable entry: {e}")),
            }
        }
        Ok(files)
    }
}

/// Streams a file through SHA-256 and returns the lowercase hex digest.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
