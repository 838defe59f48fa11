//! Curator command-line interface
//!
//! `curator <repository> <command> [options]`. Every command supports
//! `--json`; errors then come back as `{"error": ..., "code": ...}` on stdout
//! and the exit code follows the same taxonomy in both modes.

use clap::{Parser, Subcommand};
use curator::error::exit_code;
use curator::Repository;
use curator_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

mod cli;

use cli::error::CliError;
use cli::output::OutputMode;

#[derive(Parser, Debug)]
#[command(
    name = "curator",
    version,
    about = "Review files incrementally: keep, expire, rename, trash and restore"
)]
struct Cli {
    /// Directory to curate
    repository: PathBuf,

    /// Output machine-readable JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List files that still need a decision
    Scan(cli::scan::ScanArgs),
    /// List files needing review in a given order
    Sort(cli::scan::SortArgs),
    /// Record a decision for one file
    Status(cli::decide::StatusArgs),
    /// Record one decision for many files
    StatusBatch(cli::decide::StatusBatchArgs),
    /// Add or remove tags on one file
    Tag(cli::decide::TagArgs),
    /// Add or remove tags on many files
    TagBatch(cli::decide::TagBatchArgs),
    /// Rename a file within its directory
    Rename(cli::files::RenameArgs),
    /// Move a file to the repository trash
    Delete(cli::files::DeleteArgs),
    /// Bring a file back from the trash
    Restore(cli::files::RestoreArgs),
    /// List temporary keeps that have expired
    Expired(cli::expired::ExpiredArgs),
    /// Evaluate or apply curation rules
    Rules {
        #[command(subcommand)]
        action: cli::rules::RulesAction,
    },
    /// List files in the trash
    TrashList,
    /// Permanently delete everything in the trash (requires --yes)
    TrashEmpty(cli::trash::TrashEmptyArgs),
    /// Drop state entries whose files no longer exist
    Prune(cli::trash::PruneArgs),
}

fn run_command(cli: Cli, out: OutputMode) -> anyhow::Result<u8> {
    let repo = Repository::open(&cli.repository)?;
    debug!(root = %repo.root().display(), "Opened repository");

    match cli.command {
        Commands::Scan(args) => cli::scan::run_scan(&repo, args, out),
        Commands::Sort(args) => cli::scan::run_sort(&repo, args, out),
        Commands::Status(args) => cli::decide::run_status(&repo, args, out),
        Commands::StatusBatch(args) => cli::decide::run_status_batch(&repo, args, out),
        Commands::Tag(args) => cli::decide::run_tag(&repo, args, out),
        Commands::TagBatch(args) => cli::decide::run_tag_batch(&repo, args, out),
        Commands::Rename(args) => cli::files::run_rename(&repo, args, out),
        Commands::Delete(args) => cli::files::run_delete(&repo, args, out),
        Commands::Restore(args) => cli::files::run_restore(&repo, args, out),
        Commands::Expired(args) => cli::expired::run(&repo, args, out),
        Commands::Rules { action } => cli::rules::run(&repo, action, out),
        Commands::TrashList => cli::trash::run_list(&repo, out),
        Commands::TrashEmpty(args) => cli::trash::run_empty(&repo, args, out),
        Commands::Prune(args) => cli::trash::run_prune(&repo, args, out),
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_code::INVALID_INPUT
            } else {
                exit_code::SUCCESS
            };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    if let Err(err) = init_logging(LogConfig {
        app_name: "curator",
        verbose: cli.verbose,
    }) {
        eprintln!("Warning: logging disabled: {:#}", err);
    }

    let out = OutputMode {
        json: cli.json,
        quiet: cli.quiet,
    };

    match run_command(cli, out) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            let error = CliError::from_anyhow(&err);
            debug!(error = %error.message, code = error.code, "Command failed");
            error.report(out.json);
            ExitCode::from(error.code)
        }
    }
}
