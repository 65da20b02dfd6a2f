//! Error types shared across the organizer.
//!
//! Per-file problems (an unreadable image, a failed move) are reported as log
//! events and never surface here. These types describe failures that end an
//! operation or that a caller has to react to.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during organization, undo, and scanning operations.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The base directory path is invalid or doesn't exist.
    #[error("Invalid base path {}: {source}", path.display())]
    InvalidBasePath {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The directory walk could not be started or aborted.
    #[error("Error scanning folder {}: {source}", path.display())]
    ScanFailed {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// Failed to create a destination directory.
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to move a file to its destination.
    #[error("Failed to move {} to {}: {source}", from.display(), to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// Failed to copy a file to its destination.
    #[error("Failed to copy {} to {}: {source}", from.display(), to.display())]
    FileCopyFailure {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// Failed to delete a file.
    #[error("Failed to delete {}: {source}", path.display())]
    FileDeleteFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No transaction log exists for the directory.
    #[error("Log file not found: {}", path.display())]
    NoTransactionLog { path: PathBuf },

    /// Failed to write the transaction log.
    #[error("Failed to write log file: {source}")]
    TransactionLogWrite { source: std::io::Error },

    /// Failed to read the transaction log.
    #[error("Failed to read log file: {source}")]
    TransactionLogRead { source: std::io::Error },

    /// The transaction log exists but cannot be parsed.
    #[error("Could not read log file: {reason}")]
    InvalidTransactionLog { reason: String },

    /// Creating the backup archive failed.
    #[error("Failed to create backup archive {}: {reason}", path.display())]
    BackupFailed { path: PathBuf, reason: String },
}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// Invalid TOML or JSON syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failure inside a metadata or content provider.
///
/// Providers return these to the registry, which logs them and substitutes an
/// empty result; they never reach the rule engine.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("encrypted document")]
    Encrypted,
}
