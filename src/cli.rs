//! Command-line interface module for tidyrules.
//!
//! The CLI is a thin client over the engine worker:
//! - Loads settings and starts a [`Worker`]
//! - Submits one request per command
//! - Renders the events that come back until the request finishes
//! - Asks for approval between preview and execution

use crate::config::Settings;
use crate::duplicates::DuplicateSets;
use crate::engine::{Request, Worker};
use crate::events::{Event, LogLevel};
use crate::maintenance::FolderStats;
use crate::output::OutputFormatter;
use crate::preview::PreviewEntry;
use crate::transaction::TransactionLog;
use anyhow::{Context, Result, bail};
use crossbeam_channel::Receiver;
use dialoguer::Confirm;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};

/// Represents a CLI command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizeCommand {
    /// Show what organizing would do without touching anything.
    Preview { recursive: bool },
    /// Preview, ask for approval, then commit.
    Organize {
        recursive: bool,
        /// Zip the folder before the first change.
        backup: bool,
        /// Skip the approval prompt.
        assume_yes: bool,
    },
    /// Revert the last organization.
    Undo,
    /// List groups of byte-identical files.
    Duplicates,
    /// Show file count, size and extension breakdown.
    Stats,
    /// Remove empty folders.
    Cleanup,
    /// Organize one file relative to its own folder.
    OrganizeFile { path: PathBuf },
}

/// What a finished request produced besides log lines.
#[derive(Debug, Default)]
struct RequestOutcome {
    preview: Option<(Vec<PreviewEntry>, TransactionLog, bool)>,
    duplicates: Option<DuplicateSets>,
    stats: Option<FolderStats>,
    organized: Option<String>,
    errors: usize,
}

/// Runs a command with the default settings lookup.
///
/// # Examples
///
/// ```no_run
/// use tidyrules::cli::{run_cli, OrganizeCommand};
/// use std::path::Path;
///
/// let result = run_cli(OrganizeCommand::Preview { recursive: false }, Path::new("/path/to/directory"));
/// if let Err(e) = result {
///     eprintln!("Error: {e:#}");
/// }
/// ```
pub fn run_cli(command: OrganizeCommand, dir_path: &Path) -> Result<()> {
    run_cli_with_config(command, dir_path, None)
}

/// Runs a command with an optional settings file.
///
/// # Arguments
///
/// * `command` - The command to execute
/// * `dir_path` - The folder to operate on (ignored by `OrganizeFile`)
/// * `config_path` - Optional path to a TOML or JSON settings file
pub fn run_cli_with_config(
    command: OrganizeCommand,
    dir_path: &Path,
    config_path: Option<&Path>,
) -> Result<()> {
    let settings = Settings::load(config_path).context("Error loading configuration")?;
    tracing::debug!(?command, "Running command on {}", dir_path.display());

    let (worker, events) = Worker::spawn(settings).context("Could not start the organizer")?;
    let root = dir_path.to_path_buf();

    let result = match command {
        OrganizeCommand::Preview { recursive } => preview(&worker, &events, root, recursive),
        OrganizeCommand::Organize {
            recursive,
            backup,
            assume_yes,
        } => organize(&worker, &events, root, recursive, backup, assume_yes),
        OrganizeCommand::Undo => {
            OutputFormatter::info("Undoing previous organization...");
            run(&worker, &events, Request::Undo { root }).map(|_| ())
        }
        OrganizeCommand::Duplicates => {
            let outcome = run(&worker, &events, Request::DuplicateScan { root: root.clone() })?;
            if let Some(sets) = outcome.duplicates {
                OutputFormatter::duplicates(&root, &sets);
            }
            Ok(())
        }
        OrganizeCommand::Stats => {
            let outcome = run(&worker, &events, Request::FolderStats { root })?;
            if let Some(stats) = outcome.stats {
                OutputFormatter::folder_stats(&stats);
            }
            Ok(())
        }
        OrganizeCommand::Cleanup => {
            run(&worker, &events, Request::CleanupEmptyFolders { root }).map(|_| ())
        }
        OrganizeCommand::OrganizeFile { path } => {
            let outcome = run(&worker, &events, Request::OrganizeFile { path })?;
            match outcome.organized {
                Some(summary) => OutputFormatter::success(&summary),
                None if outcome.errors == 0 => OutputFormatter::plain("Nothing to do."),
                None => {}
            }
            Ok(())
        }
    };

    worker.shutdown();
    result
}

fn preview(
    worker: &Worker,
    events: &Receiver<Event>,
    root: PathBuf,
    recursive: bool,
) -> Result<()> {
    let outcome = run(
        worker,
        events,
        Request::Preview {
            root: root.clone(),
            backup_first: false,
            recursive,
        },
    )?;
    let Some((entries, plan, _)) = outcome.preview else {
        bail!("Could not preview {}", root.display());
    };

    if entries.is_empty() {
        OutputFormatter::success("Nothing to organize.");
        return Ok(());
    }
    OutputFormatter::preview_table(&root, &entries);
    OutputFormatter::summary_table(&entries);
    OutputFormatter::plain(&format!(
        "\n{} planned actions. Run 'tidyrules organize {}' to apply them.",
        plan.len(),
        root.display()
    ));
    Ok(())
}

fn organize(
    worker: &Worker,
    events: &Receiver<Event>,
    root: PathBuf,
    recursive: bool,
    backup: bool,
    assume_yes: bool,
) -> Result<()> {
    let outcome = run(
        worker,
        events,
        Request::Preview {
            root: root.clone(),
            backup_first: backup,
            recursive,
        },
    )?;
    let Some((entries, plan, backup_first)) = outcome.preview else {
        bail!("Could not preview {}", root.display());
    };

    if plan.is_empty() {
        if entries.is_empty() {
            OutputFormatter::success("Nothing to organize.");
        } else {
            OutputFormatter::preview_table(&root, &entries);
            OutputFormatter::warning("Every proposed action would be skipped.");
        }
        return Ok(());
    }

    OutputFormatter::preview_table(&root, &entries);
    OutputFormatter::summary_table(&entries);

    if !assume_yes {
        let approved = Confirm::new()
            .with_prompt(format!("Apply {} changes?", plan.len()))
            .default(false)
            .interact()
            .context("Could not read confirmation")?;
        if !approved {
            OutputFormatter::warning("Cancelled. No files were modified.");
            return Ok(());
        }
    }

    let outcome = run(
        worker,
        events,
        Request::Execute {
            root: root.clone(),
            plan,
            backup_first,
        },
    )?;
    if TransactionLog::exists(&root) {
        OutputFormatter::plain(&format!(
            "History saved. Use 'tidyrules undo {}' to revert changes.",
            root.display()
        ));
    }
    if outcome.errors > 0 {
        OutputFormatter::warning("Some files could not be organized. Please review errors above.");
    }
    Ok(())
}

/// Submits one request and renders its events until it finishes.
fn run(worker: &Worker, events: &Receiver<Event>, request: Request) -> Result<RequestOutcome> {
    if !worker.submit(request) {
        bail!("The organizer stopped unexpectedly");
    }

    let mut outcome = RequestOutcome::default();
    let mut progress: Option<ProgressBar> = None;

    for event in events.iter() {
        match event {
            Event::Log { level, message } => {
                if level == LogLevel::Error {
                    outcome.errors += 1;
                }
                match &progress {
                    Some(pb) => pb.suspend(|| OutputFormatter::log_line(level, &message)),
                    None => OutputFormatter::log_line(level, &message),
                }
            }
            Event::Progress { current, total } => {
                let pb = progress
                    .get_or_insert_with(|| OutputFormatter::create_progress_bar(total as u64));
                pb.set_length(total as u64);
                pb.set_position(current as u64);
            }
            Event::PreviewReady {
                entries,
                plan,
                backup_first,
            } => outcome.preview = Some((entries, plan, backup_first)),
            Event::DuplicatesFound(sets) => outcome.duplicates = Some(sets),
            Event::FolderStats(stats) => outcome.stats = Some(stats),
            Event::SingleFileOrganized(summary) => outcome.organized = Some(summary),
            Event::Finished => {
                if let Some(pb) = progress.take() {
                    pb.finish_and_clear();
                }
                return Ok(outcome);
            }
        }
    }
    bail!("The organizer stopped before finishing")
}
