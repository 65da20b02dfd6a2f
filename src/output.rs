//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored log lines,
//! progress bars, and the preview, duplicate and statistics tables. The
//! engine never prints; the CLI renders its events through this module.

use crate::duplicates::DuplicateSets;
use crate::events::LogLevel;
use crate::maintenance::FolderStats;
use crate::preview::{PreviewEntry, PreviewStatus, relative_display};
use crate::rule::ActionKind;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;

/// How many extensions the statistics table lists.
const TOP_EXTENSIONS: usize = 10;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyrules::output::OutputFormatter;
    /// OutputFormatter::success("Organization complete!");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints an engine log line with the style of its level.
    pub fn log_line(level: LogLevel, message: &str) {
        match level {
            LogLevel::Info if message.starts_with("---") => Self::info(message),
            LogLevel::Info => Self::plain(message),
            LogLevel::Warn => Self::warning(message.trim_start()),
            LogLevel::Error => Self::error(message.trim_start()),
        }
    }

    /// Creates and returns a progress bar for file operations.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tidyrules::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.inc(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints the proposed actions of a preview, one per line.
    pub fn preview_table(root: &Path, entries: &[PreviewEntry]) {
        Self::header("PROPOSED CHANGES");
        let width = entries
            .iter()
            .map(|entry| relative_display(root, &entry.source).len())
            .max()
            .unwrap_or(0)
            .max(6);

        for entry in entries {
            let action = format!("{:<7}", entry.action.as_str().to_uppercase());
            let action = match entry.action {
                ActionKind::Delete => action.red().bold(),
                ActionKind::Copy => action.blue(),
                ActionKind::Rename => action.magenta(),
                ActionKind::Move => action.green(),
            };
            let source = relative_display(root, &entry.source);
            let destination = match entry.status {
                PreviewStatus::Skipped => entry.to_string().dimmed(),
                PreviewStatus::Renamed => entry.to_string().yellow(),
                PreviewStatus::Delete => entry.to_string().red(),
                PreviewStatus::Planned => entry.to_string().normal(),
            };
            println!("{action} {source:<width$} → {destination}");
        }
    }

    /// Prints a summary table with the number of planned actions by kind.
    pub fn summary_table(entries: &[PreviewEntry]) {
        Self::header("SUMMARY");

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut skipped = 0;
        for entry in entries {
            if entry.is_planned() {
                *counts.entry(entry.action.as_str()).or_insert(0) += 1;
            } else {
                skipped += 1;
            }
        }

        let width = 8;
        println!("{:<width$} | {}", "Action".bold(), "Files".bold());
        println!("{}", "-".repeat(width + 10));
        for (action, count) in &counts {
            println!("{:<width$} | {}", action, count.to_string().green());
        }
        if skipped > 0 {
            println!("{:<width$} | {}", "skipped", skipped.to_string().yellow());
        }
        println!("{}", "-".repeat(width + 10));
        let total: usize = counts.values().sum();
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            if total == 1 { "file" } else { "files" },
        );
    }

    /// Prints groups of identical files; the first of each group is the
    /// one to keep.
    pub fn duplicates(root: &Path, sets: &DuplicateSets) {
        if sets.is_empty() {
            Self::success("No duplicate files found.");
            return;
        }

        Self::header(&format!("DUPLICATES ({} sets)", sets.len()));
        for (hash, paths) in sets {
            println!("{}", hash.get(..12).unwrap_or(hash).dimmed());
            for (index, path) in paths.iter().enumerate() {
                let shown = relative_display(root, path);
                if index == 0 {
                    println!("  {} {}", "keep".green(), shown);
                } else {
                    println!("  {} {}", "dupe".yellow(), shown);
                }
            }
        }
    }

    /// Prints file count, size and the most common extensions.
    pub fn folder_stats(stats: &FolderStats) {
        Self::header("FOLDER STATISTICS");
        println!("{:<10} {}", "Files:".bold(), stats.file_count);
        println!("{:<10} {}", "Size:".bold(), stats.size_display());

        let top = stats.top_extensions();
        if top.is_empty() {
            return;
        }
        println!("{}", "Top file types:".bold());
        for (extension, count) in top.into_iter().take(TOP_EXTENSIONS) {
            println!(
                "  {:<10} {} {}",
                extension,
                count.to_string().green(),
                if count == 1 { "file" } else { "files" }
            );
        }
    }
}
