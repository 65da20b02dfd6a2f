//! Events delivered from the engine to its caller.
//!
//! The engine never prints. Every human-readable line, progress tick and
//! result is sent as an [`Event`] through an [`EventSink`], which also mirrors
//! log lines into `tracing` so library users get them without a channel.

use crate::duplicates::DuplicateSets;
use crate::maintenance::FolderStats;
use crate::preview::PreviewEntry;
use crate::transaction::TransactionLog;
use crossbeam_channel::Sender;

/// Severity of a log line sent to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A notification from the engine.
#[derive(Debug, Clone)]
pub enum Event {
    /// A human-readable progress, warning or error line.
    Log { level: LogLevel, message: String },
    /// Items processed so far out of the operation's total.
    Progress { current: usize, total: usize },
    /// A preview finished; the caller decides whether to execute `plan`.
    PreviewReady {
        entries: Vec<PreviewEntry>,
        plan: TransactionLog,
        backup_first: bool,
    },
    /// Groups of byte-identical files, keyed by content hash.
    DuplicatesFound(DuplicateSets),
    /// File count, size and extension histogram for a folder.
    FolderStats(FolderStats),
    /// A single watched file was handled.
    SingleFileOrganized(String),
    /// The current operation is over, successfully or not.
    Finished,
}

/// Sending half of the event channel.
///
/// A sink without a channel only traces; a dropped receiver is ignored so
/// a caller that stops listening cannot take the engine down.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<Sender<Event>>,
}

impl EventSink {
    pub fn new(sender: Sender<Event>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A sink that only records through `tracing`.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        self.emit(Event::Log {
            level: LogLevel::Info,
            message,
        });
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.emit(Event::Log {
            level: LogLevel::Warn,
            message,
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{message}");
        self.emit(Event::Log {
            level: LogLevel::Error,
            message,
        });
    }

    pub fn progress(&self, current: usize, total: usize) {
        self.emit(Event::Progress { current, total });
    }

    pub fn emit(&self, event: Event) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}
