//! `expired`: temporary keeps past their date.

use crate::cli::output::{print_table, OutputMode};
use clap::Args;
use curator::error::exit_code;
use curator::ops::{self, ExpiredDetail};
use curator::state::now_local;
use curator::{Decision, Repository};
use serde::Serialize;

#[derive(Args, Debug, Clone)]
pub struct ExpiredArgs {
    /// Move expired files back to decide_later
    #[arg(long)]
    pub mark_decide_later: bool,
}

#[derive(Debug, Serialize)]
struct ExpiredOutput {
    expired: Vec<String>,
    details: Vec<ExpiredDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated: Option<Vec<String>>,
}

pub fn run(repo: &Repository, args: ExpiredArgs, out: OutputMode) -> anyhow::Result<u8> {
    let now = now_local();
    let details = ops::mark_expired(repo, now)?;
    let updated = if args.mark_decide_later {
        Some(ops::resolve_expired(repo, now, Decision::DecideLater)?)
    } else {
        None
    };

    let output = ExpiredOutput {
        expired: details.iter().map(|d| d.filename.clone()).collect(),
        details,
        updated,
    };
    out.emit(&output, || print_human(&output))?;
    Ok(exit_code::SUCCESS)
}

fn print_human(output: &ExpiredOutput) {
    if output.details.is_empty() {
        println!("No expired files.");
        return;
    }
    let rows = output
        .details
        .iter()
        .map(|d| {
            vec![
                d.filename.clone(),
                d.keep_days.map(|k| k.to_string()).unwrap_or_else(|| "-".to_string()),
                d.expiry_date.clone().unwrap_or_else(|| "-".to_string()),
                d.days_overdue.to_string(),
            ]
        })
        .collect();
    print_table(&["FILE", "KEEP DAYS", "EXPIRED ON", "DAYS OVERDUE"], rows);
    if let Some(updated) = &output.updated {
        println!("Reset {} file(s) to decide_later.", updated.len());
    }
}
