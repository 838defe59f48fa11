//! `rules dry-run` and `rules apply`.

use crate::cli::output::{print_table, OutputMode};
use crate::cli::scan::ListArgs;
use clap::{Args, Subcommand};
use curator::error::exit_code;
use curator::rules::{load_rules, run_rules, RulesReport, RunMode};
use curator::state::now_local;
use curator::Repository;
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone)]
pub enum RulesAction {
    /// Report what the rules would do without changing anything
    DryRun(RulesArgs),
    /// Apply the first matching rule to each file
    Apply(RulesArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RulesArgs {
    #[command(flatten)]
    pub list: ListArgs,

    /// Rules file (defaults to curator_rules.json in the repository)
    #[arg(long, value_name = "PATH")]
    pub rules_file: Option<PathBuf>,
}

pub fn run(repo: &Repository, action: RulesAction, out: OutputMode) -> anyhow::Result<u8> {
    let (mode, args) = match action {
        RulesAction::DryRun(args) => (RunMode::DryRun, args),
        RulesAction::Apply(args) => (RunMode::Apply, args),
    };
    let path = args.rules_file.unwrap_or_else(|| repo.rules_path());
    let rules = load_rules(&path)?;
    let report = run_rules(repo, &rules, &args.list.to_options(), mode, now_local())?;

    out.emit(&report, || print_human(&report, mode))?;
    Ok(if report.failed > 0 {
        exit_code::FAILED
    } else {
        exit_code::SUCCESS
    })
}

fn print_human(report: &RulesReport, mode: RunMode) {
    if !report.results.is_empty() {
        let rows = report
            .results
            .iter()
            .map(|r| {
                let state = if let Some(err) = &r.error {
                    format!("failed: {}", err)
                } else if r.skipped {
                    "no change".to_string()
                } else if r.applied {
                    "applied".to_string()
                } else {
                    "would apply".to_string()
                };
                vec![
                    r.filename.clone(),
                    r.rule.clone(),
                    match &r.action_value {
                        Some(v) => format!("{} {}", r.action, v),
                        None => r.action.clone(),
                    },
                    r.target.clone().unwrap_or_default(),
                    state,
                ]
            })
            .collect();
        print_table(&["FILE", "RULE", "ACTION", "TARGET", "RESULT"], rows);
    }
    match mode {
        RunMode::DryRun => println!("Rules dry-run: Matched {} items", report.matched),
        RunMode::Apply => println!(
            "Rules apply: Applied {} items ({} skipped, {} failed)",
            report.applied, report.skipped, report.failed
        ),
    }
}
