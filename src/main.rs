use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tidyrules::cli::{OrganizeCommand, run_cli_with_config};
use tidyrules::output::OutputFormatter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Rule-driven folder organizer with reviewable plans and undo.
#[derive(Debug, Parser)]
#[command(name = "tidyrules", version, about)]
struct Args {
    /// Settings file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show what would be organized without changing anything
    Preview {
        dir: PathBuf,
        /// Include subfolders
        #[arg(short, long)]
        recursive: bool,
    },
    /// Preview, confirm, then organize
    Organize {
        dir: PathBuf,
        /// Include subfolders
        #[arg(short, long)]
        recursive: bool,
        /// Zip the folder next to it before changing anything
        #[arg(short, long)]
        backup: bool,
        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Revert the last organization
    Undo { dir: PathBuf },
    /// Find byte-identical files
    Duplicates { dir: PathBuf },
    /// Show file count, size and top extensions
    Stats { dir: PathBuf },
    /// Remove empty folders
    Cleanup { dir: PathBuf },
    /// Organize a single file within its own folder
    OrganizeFile { path: PathBuf },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tidyrules=debug" } else { "error" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let (command, dir) = match args.command {
        Command::Preview { dir, recursive } => (OrganizeCommand::Preview { recursive }, dir),
        Command::Organize {
            dir,
            recursive,
            backup,
            yes,
        } => (
            OrganizeCommand::Organize {
                recursive,
                backup,
                assume_yes: yes,
            },
            dir,
        ),
        Command::Undo { dir } => (OrganizeCommand::Undo, dir),
        Command::Duplicates { dir } => (OrganizeCommand::Duplicates, dir),
        Command::Stats { dir } => (OrganizeCommand::Stats, dir),
        Command::Cleanup { dir } => (OrganizeCommand::Cleanup, dir),
        Command::OrganizeFile { path } => {
            let dir = path.parent().map(PathBuf::from).unwrap_or_default();
            (OrganizeCommand::OrganizeFile { path }, dir)
        }
    };

    if let Err(e) = run_cli_with_config(command, &dir, args.config.as_deref()) {
        OutputFormatter::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
