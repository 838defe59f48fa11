//! `trash-list`, `trash-empty` and `prune`.

use crate::cli::error::CliError;
use crate::cli::output::OutputMode;
use clap::Args;
use curator::error::exit_code;
use curator::ops;
use curator::Repository;
use serde::Serialize;

#[derive(Args, Debug, Clone)]
pub struct TrashEmptyArgs {
    /// Confirm permanent deletion of everything in the trash
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PruneArgs {
    /// Report stale entries without removing them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct TrashList {
    files: Vec<String>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct TrashEmptied {
    result: &'static str,
    removed: usize,
    files: Vec<String>,
}

pub fn run_list(repo: &Repository, out: OutputMode) -> anyhow::Result<u8> {
    let files = ops::list_trash(repo)?;
    let output = TrashList {
        count: files.len(),
        files,
    };
    out.emit(&output, || {
        if output.files.is_empty() {
            println!("Trash is empty.");
        }
        for file in &output.files {
            println!("{}", file);
        }
    })?;
    Ok(exit_code::SUCCESS)
}

pub fn run_empty(repo: &Repository, args: TrashEmptyArgs, out: OutputMode) -> anyhow::Result<u8> {
    if !args.yes {
        return Err(CliError::confirmation_required("trash-empty").into());
    }
    let files = ops::empty_trash(repo)?;
    let output = TrashEmptied {
        result: "emptied",
        removed: files.len(),
        files,
    };
    out.emit(&output, || {
        println!("Permanently removed {} file(s) from trash.", output.removed)
    })?;
    Ok(exit_code::SUCCESS)
}

pub fn run_prune(repo: &Repository, args: PruneArgs, out: OutputMode) -> anyhow::Result<u8> {
    let report = ops::prune(repo, args.dry_run)?;
    out.emit(&report, || {
        let verb = if report.dry_run { "Would remove" } else { "Removed" };
        println!("{} {} stale entr{}.", verb, report.count, if report.count == 1 { "y" } else { "ies" });
        for key in &report.removed {
            println!("  {}", key);
        }
    })?;
    Ok(exit_code::SUCCESS)
}
