//! tidyrules - A rule-driven folder organizer
//!
//! This library plans where every file in a folder should go (by ordered
//! user rules over names, sizes, dates, contents and embedded metadata, or
//! by extension category), lets the caller review the plan, commits it with
//! a transaction log, and can undo the last commit. It also finds duplicate
//! files, reports folder statistics and removes empty folders.

pub mod backup;
pub mod cli;
pub mod condition;
pub mod config;
pub mod conflict;
pub mod content;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod events;
pub mod file_category;
pub mod file_organizer;
pub mod maintenance;
pub mod metadata;
pub mod output;
pub mod preview;
pub mod resolver;
pub mod rule;
pub mod scan;
pub mod transaction;
pub mod undo;

pub use config::Settings;
pub use conflict::ConflictStrategy;
pub use engine::{Engine, Request, Worker};
pub use error::{ConfigError, ExtractError, OrganizeError, OrganizeResult};
pub use events::{Event, EventSink, LogLevel};
pub use file_category::CategoryTable;
pub use file_organizer::FileOrganizer;
pub use preview::{Preview, PreviewEntry, PreviewStatus};
pub use rule::{ActionKind, Condition, ConditionKind, Matcher, Rule};
pub use transaction::{LogEntry, TransactionLog};
pub use undo::{UndoManager, UndoReport};

pub use cli::{OrganizeCommand, run_cli};
