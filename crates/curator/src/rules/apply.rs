//! Running rules over a scan: dry run or apply.

use super::engine::{first_match, FileAttributes};
use super::model::{Action, Rule};
use crate::error::Result;
use crate::ops::{
    delete_to_trash, move_to, plan_delete, plan_move, plan_rename, rename, update_tags,
    CollisionPolicy, RealFs,
};
use crate::repo::{file_name_of, parent_of, Repository};
use crate::scan::{scan_with_record, FileDescriptor, ScanOptions, SortKey, SortOrder};
use crate::state::StateRecord;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    DryRun,
    Apply,
}

/// Outcome for one matched file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleResult {
    pub filename: String,
    pub rule: String,
    pub action: String,
    pub action_value: Option<String>,
    pub applied: bool,
    /// Where the file went (or would go) for trash, rename and move
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RulesReport {
    pub results: Vec<RuleResult>,
    pub matched: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// An action that would change nothing for this file.
fn is_noop(action: &Action, file: &FileDescriptor) -> bool {
    match action {
        Action::AddTag(tag) => file.tags.iter().any(|t| t == tag),
        Action::RemoveTag(tag) => !file.tags.iter().any(|t| t == tag),
        Action::Rename(name) => file_name_of(&file.path) == name,
        Action::Move(dest) => parent_of(&file.path) == dest,
        Action::Trash => false,
    }
}

/// Destination the plan step picks, without touching anything.
fn preview(
    repo: &Repository,
    record: &StateRecord,
    action: &Action,
    rel: &str,
) -> Result<Option<String>> {
    Ok(match action {
        Action::Trash => Some(plan_delete(repo, &RealFs, rel)?.trash_path),
        Action::Rename(name) => {
            Some(plan_rename(repo, &RealFs, record, rel, name, CollisionPolicy::Fail)?.to)
        }
        Action::Move(dest) => {
            Some(plan_move(repo, &RealFs, record, rel, dest, CollisionPolicy::Fail)?.to)
        }
        Action::AddTag(_) | Action::RemoveTag(_) => None,
    })
}

/// Perform the action; each call takes the state lock on its own.
fn execute(repo: &Repository, action: &Action, rel: &str) -> Result<Option<String>> {
    Ok(match action {
        Action::Trash => Some(delete_to_trash(repo, rel)?.trash_path),
        Action::AddTag(tag) => {
            update_tags(repo, rel, std::slice::from_ref(tag), &[], false)?;
            None
        }
        Action::RemoveTag(tag) => {
            update_tags(repo, rel, &[], std::slice::from_ref(tag), false)?;
            None
        }
        Action::Rename(name) => Some(rename(repo, rel, name, CollisionPolicy::Fail)?.new),
        Action::Move(dest) => Some(move_to(repo, rel, dest, CollisionPolicy::Fail)?.new),
    })
}

/// Evaluate `rules` against the files a scan with `options` would list.
///
/// Candidates are unpaginated and in name order. In apply mode a failing
/// item is reported and counted; the rest of the run continues.
pub fn run_rules(
    repo: &Repository,
    rules: &[Rule],
    options: &ScanOptions,
    mode: RunMode,
    now: DateTime<FixedOffset>,
) -> Result<RulesReport> {
    let candidate_options = ScanOptions {
        sort_by: SortKey::Name,
        sort_order: SortOrder::Asc,
        offset: 0,
        limit: None,
        ..options.clone()
    };
    let record = repo.store().read()?;
    let candidates = scan_with_record(repo, &record, &candidate_options, now)?.files;

    let mut report = RulesReport::default();
    for file in &candidates {
        let attrs = FileAttributes::from(file);
        let Some(rule) = first_match(&attrs, rules, now) else {
            continue;
        };
        report.matched += 1;

        let mut result = RuleResult {
            filename: file.path.clone(),
            rule: rule.name.clone(),
            action: rule.action.kind().to_string(),
            action_value: rule.action.value().map(str::to_string),
            applied: false,
            target: None,
            skipped: false,
            error: None,
        };

        if is_noop(&rule.action, file) {
            result.skipped = true;
            report.skipped += 1;
            report.results.push(result);
            continue;
        }

        let outcome = match mode {
            RunMode::DryRun => preview(repo, &record, &rule.action, &file.path),
            RunMode::Apply => execute(repo, &rule.action, &file.path),
        };
        match outcome {
            Ok(target) => {
                result.target = target;
                if mode == RunMode::Apply {
                    result.applied = true;
                    report.applied += 1;
                }
            }
            Err(err) => {
                warn!(file = %file.path, rule = %rule.name, error = %err, "Rule action failed");
                result.error = Some(err.to_string());
                report.failed += 1;
            }
        }
        report.results.push(result);
    }

    info!(
        candidates = candidates.len(),
        matched = report.matched,
        applied = report.applied,
        skipped = report.skipped,
        failed = report.failed,
        dry_run = mode == RunMode::DryRun,
        "Rules run finished"
    );
    Ok(report)
}
