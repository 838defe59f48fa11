//! `rename`, `delete` and `restore`.

use crate::cli::output::OutputMode;
use clap::Args;
use curator::error::exit_code;
use curator::ops::{self, CollisionPolicy};
use curator::Repository;
use serde::Serialize;
use std::io::{self, BufRead, IsTerminal, Write};

#[derive(Args, Debug, Clone)]
pub struct RenameArgs {
    /// Current path, relative to the repository
    pub old_name: String,

    /// New file name (same directory)
    pub new_name: String,

    /// What to do when the new name is taken: fail or disambiguate
    #[arg(long, default_value = "fail")]
    pub on_conflict: String,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// File to move to the trash
    pub filename: String,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RestoreArgs {
    /// File to bring back, by its original path
    pub filename: String,
}

#[derive(Debug, Serialize)]
struct Renamed<'a> {
    result: &'static str,
    old: &'a str,
    new: &'a str,
}

#[derive(Debug, Serialize)]
struct Deleted<'a> {
    result: &'static str,
    filename: &'a str,
    trash_path: &'a str,
}

#[derive(Debug, Serialize)]
struct Restored<'a> {
    result: &'static str,
    filename: &'a str,
    restored_from: &'a str,
}

pub fn run_rename(repo: &Repository, args: RenameArgs, out: OutputMode) -> anyhow::Result<u8> {
    let policy: CollisionPolicy = args.on_conflict.parse()?;
    let rel = repo.resolve_user_path(&args.old_name)?;
    let outcome = ops::rename(repo, &rel, &args.new_name, policy)?;
    out.emit(
        &Renamed {
            result: "renamed",
            old: &outcome.old,
            new: &outcome.new,
        },
        || println!("Renamed {} -> {}", outcome.old, outcome.new),
    )?;
    Ok(exit_code::SUCCESS)
}

/// Ask on the terminal; anything but y/yes declines.
fn confirm(prompt: &str) -> io::Result<bool> {
    eprint!("{} [y/N]: ", prompt);
    io::stderr().flush()?;
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer)? == 0 {
        return Ok(false);
    }
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub fn run_delete(repo: &Repository, args: DeleteArgs, out: OutputMode) -> anyhow::Result<u8> {
    let rel = repo.resolve_user_path(&args.filename)?;
    if !repo.absolute(&rel).is_file() {
        return Err(curator::CuratorError::not_found(rel).into());
    }

    if !args.yes && !out.json && io::stdin().is_terminal() {
        if !confirm(&format!("Delete '{}' (move to trash)?", rel))? {
            if !out.quiet {
                println!("Aborted.");
            }
            return Ok(exit_code::SUCCESS);
        }
    }

    let outcome = ops::delete_to_trash(repo, &rel)?;
    out.emit(
        &Deleted {
            result: "deleted",
            filename: &outcome.filename,
            trash_path: &outcome.trash_path,
        },
        || println!("Moved {} to {}", outcome.filename, outcome.trash_path),
    )?;
    Ok(exit_code::SUCCESS)
}

pub fn run_restore(repo: &Repository, args: RestoreArgs, out: OutputMode) -> anyhow::Result<u8> {
    let rel = repo.resolve_user_path(&args.filename)?;
    let outcome = ops::restore(repo, &rel)?;
    out.emit(
        &Restored {
            result: "restored",
            filename: &outcome.filename,
            restored_from: &outcome.restored_from,
        },
        || println!("Restored {} from {}", outcome.filename, outcome.restored_from),
    )?;
    Ok(exit_code::SUCCESS)
}
