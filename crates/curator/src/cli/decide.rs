//! `status`, `tag` and their batch forms.

use crate::cli::error::CliError;
use crate::cli::output::{print_json, print_table, OutputMode};
use clap::Args;
use curator::error::exit_code;
use curator::ops::{self, BatchReport};
use curator::{Decision, Repository};
use serde::Serialize;
use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// File to update, relative to the repository
    pub filename: String,

    /// decide_later, keep or keep_forever
    pub status: String,

    /// Days to keep (required for keep)
    #[arg(long, allow_negative_numbers = true)]
    pub days: Option<i64>,

    /// Record the decision even if the file does not exist
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TagArgs {
    /// File to tag, relative to the repository
    pub filename: String,

    #[command(flatten)]
    pub tags: TagChanges,

    /// Update tags even if the file does not exist
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TagChanges {
    /// Tags to add
    #[arg(long, num_args = 1.., value_delimiter = ',', value_name = "TAG")]
    pub add: Vec<String>,

    /// Tags to remove
    #[arg(long, num_args = 1.., value_delimiter = ',', value_name = "TAG")]
    pub remove: Vec<String>,
}

/// Where batch commands get their filenames.
#[derive(Args, Debug, Clone, Default)]
pub struct FileSource {
    /// Filenames to update
    #[arg(long, num_args = 1.., value_name = "FILE")]
    pub files: Vec<String>,

    /// Read newline-delimited filenames from a file
    #[arg(long, value_name = "PATH")]
    pub from_file: Option<PathBuf>,

    /// Read newline-delimited filenames from standard input
    #[arg(long)]
    pub stdin: bool,
}

impl FileSource {
    /// Every filename from every source, in order, blanks dropped.
    pub fn collect(&self) -> anyhow::Result<Vec<String>> {
        let mut files: Vec<String> = self.files.clone();
        if let Some(path) = &self.from_file {
            let content = fs::read_to_string(path)
                .map_err(|e| CliError::cannot_read_list(path, &e.to_string()))?;
            files.extend(content.lines().map(str::to_string));
        }
        if self.stdin {
            for line in io::stdin().lock().lines() {
                files.push(line?);
            }
        }
        let files: Vec<String> = files
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if files.is_empty() {
            return Err(CliError::no_filenames().into());
        }
        Ok(files)
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatusBatchArgs {
    #[command(flatten)]
    pub source: FileSource,

    /// decide_later, keep or keep_forever
    #[arg(long)]
    pub status: String,

    /// Days to keep (required for keep)
    #[arg(long, allow_negative_numbers = true)]
    pub days: Option<i64>,

    /// Record decisions even for files that do not exist
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TagBatchArgs {
    #[command(flatten)]
    pub source: FileSource,

    #[command(flatten)]
    pub tags: TagChanges,

    /// Update tags even for files that do not exist
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct Updated<T: Serialize> {
    result: &'static str,
    #[serde(flatten)]
    inner: T,
}

pub fn run_status(repo: &Repository, args: StatusArgs, out: OutputMode) -> anyhow::Result<u8> {
    let decision = Decision::parse(&args.status, args.days)?;
    let rel = repo.resolve_user_path(&args.filename)?;
    let outcome = ops::set_status(repo, &rel, decision, args.force)?;
    out.emit(
        &Updated {
            result: "updated",
            inner: &outcome,
        },
        || match outcome.days {
            Some(days) => println!("{}: {} for {} days", outcome.filename, outcome.status, days),
            None => println!("{}: {}", outcome.filename, outcome.status),
        },
    )?;
    Ok(exit_code::SUCCESS)
}

pub fn run_tag(repo: &Repository, args: TagArgs, out: OutputMode) -> anyhow::Result<u8> {
    let rel = repo.resolve_user_path(&args.filename)?;
    let outcome = ops::update_tags(repo, &rel, &args.tags.add, &args.tags.remove, args.force)?;
    out.emit(
        &Updated {
            result: "updated",
            inner: &outcome,
        },
        || {
            if outcome.tags.is_empty() {
                println!("{}: no tags", outcome.filename);
            } else {
                println!("{}: {}", outcome.filename, outcome.tags.join(", "));
            }
        },
    )?;
    Ok(exit_code::SUCCESS)
}

pub fn run_status_batch(
    repo: &Repository,
    args: StatusBatchArgs,
    out: OutputMode,
) -> anyhow::Result<u8> {
    let decision = Decision::parse(&args.status, args.days)?;
    let files = args.source.collect()?;
    let report = ops::status_batch(repo, &files, decision, args.force)?;
    finish_batch(&report, out)
}

pub fn run_tag_batch(repo: &Repository, args: TagBatchArgs, out: OutputMode) -> anyhow::Result<u8> {
    let files = args.source.collect()?;
    let report = ops::tag_batch(repo, &files, &args.tags.add, &args.tags.remove, args.force)?;
    finish_batch(&report, out)
}

fn finish_batch(report: &BatchReport, out: OutputMode) -> anyhow::Result<u8> {
    if out.json {
        print_json(report)?;
    } else if !out.quiet {
        if report.has_failures() {
            let rows = report
                .results
                .iter()
                .filter_map(|item| {
                    item.error
                        .as_ref()
                        .map(|e| vec![item.filename.clone(), e.clone(), item.code.to_string()])
                })
                .collect();
            print_table(&["FILE", "ERROR", "CODE"], rows);
        }
        println!(
            "Updated {} file(s), {} failed.",
            report.updated.len(),
            report.failed.len()
        );
    }
    Ok(if report.has_failures() {
        exit_code::FAILED
    } else {
        exit_code::SUCCESS
    })
}
