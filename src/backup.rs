//! Zip backup of a tree before it is organized.

use crate::error::{OrganizeError, OrganizeResult};
use crate::transaction::LOG_FILE_NAME;
use chrono::{DateTime, Local};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Where the archive for `root` goes: next to it, in the parent directory.
///
/// `root` should already be resolved; a relative `.` has no parent to put
/// the archive in.
pub fn backup_path(root: &Path, now: DateTime<Local>) -> PathBuf {
    let parent = root.parent().unwrap_or(root);
    parent.join(format!(
        "tidyrules_backup_{}.zip",
        now.format("%Y%m%d_%H%M%S")
    ))
}

/// Archives every file under `root` except the transaction log.
///
/// Returns the path of the archive. A half-written archive is removed on
/// failure.
pub fn create_backup(root: &Path) -> OrganizeResult<PathBuf> {
    let root = root
        .canonicalize()
        .map_err(|e| OrganizeError::BackupFailed {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
    let archive_path = backup_path(&root, Local::now());
    match write_archive(&root, &archive_path) {
        Ok(count) => {
            tracing::debug!("Archived {} files into {}", count, archive_path.display());
            Ok(archive_path)
        }
        Err(reason) => {
            let _ = std::fs::remove_file(&archive_path);
            Err(OrganizeError::BackupFailed {
                path: archive_path,
                reason,
            })
        }
    }
}

fn write_archive(root: &Path, archive_path: &Path) -> Result<usize, String> {
    let file = File::create(archive_path).map_err(|e| e.to_string())?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut count = 0;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| e.to_string())?;
        if !entry.file_type().is_file()
            || entry.file_name() == LOG_FILE_NAME
            || entry.path() == archive_path
        {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| e.to_string())?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        zip.start_file(name, options).map_err(|e| e.to_string())?;
        let mut source = File::open(entry.path()).map_err(|e| e.to_string())?;
        io::copy(&mut source, &mut zip).map_err(|e| e.to_string())?;
        count += 1;
    }

    zip.finish().map_err(|e| e.to_string())?;
    Ok(count)
}
