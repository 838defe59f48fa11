//! Status and tag updates, single and batched.

use crate::error::{exit_code, CuratorError, Result};
use crate::repo::Repository;
use crate::state::{now_local, Decision, Status};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusOutcome {
    pub filename: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagOutcome {
    pub filename: String,
    pub tags: Vec<String>,
}

/// Per-file line of a batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItem {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub code: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub results: Vec<BatchItem>,
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

impl BatchReport {
    fn record<T>(&mut self, filename: &str, outcome: Result<T>) {
        match outcome {
            Ok(_) => {
                self.updated.push(filename.to_string());
                self.results.push(BatchItem {
                    filename: filename.to_string(),
                    result: Some("updated".to_string()),
                    error: None,
                    code: exit_code::SUCCESS,
                });
            }
            Err(err) => {
                warn!(file = %filename, error = %err, "Batch item failed");
                self.failed.push(filename.to_string());
                self.results.push(BatchItem {
                    filename: filename.to_string(),
                    result: None,
                    error: Some(err.to_string()),
                    code: err.exit_code(),
                });
            }
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Without `force`, the target must be an existing regular file.
fn ensure_target(repo: &Repository, rel: &str, force: bool) -> Result<()> {
    if force {
        return Ok(());
    }
    let path = repo.absolute(rel);
    if path.is_file() {
        Ok(())
    } else if path.exists() {
        Err(CuratorError::validation(format!("Not a regular file: {}", rel)))
    } else {
        Err(CuratorError::not_found(rel))
    }
}

/// Trimmed, non-empty tag names.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Record a decision for one file.
pub fn set_status(
    repo: &Repository,
    rel: &str,
    decision: Decision,
    force: bool,
) -> Result<StatusOutcome> {
    let outcome = repo.store().update(|record| {
        ensure_target(repo, rel, force)?;
        let now = now_local();
        record
            .entry_or_default(rel, now)
            .apply_decision(decision, now);
        Ok(StatusOutcome {
            filename: rel.to_string(),
            status: decision.status(),
            days: decision.keep_days(),
        })
    })?;
    info!(file = %rel, status = %outcome.status, "Updated status");
    Ok(outcome)
}

/// Add and remove tags on one file. Removal wins when a tag is in both lists.
pub fn update_tags(
    repo: &Repository,
    rel: &str,
    add: &[String],
    remove: &[String],
    force: bool,
) -> Result<TagOutcome> {
    let add = normalize_tags(add);
    let remove = normalize_tags(remove);
    if add.is_empty() && remove.is_empty() {
        return Err(CuratorError::validation("No tags to add or remove"));
    }

    repo.store().update(|record| {
        ensure_target(repo, rel, force)?;
        let now = now_local();
        let entry = record.entry_or_default(rel, now);
        entry.tags.extend(add.iter().cloned());
        for tag in &remove {
            entry.tags.remove(tag);
        }
        entry.touch(now);
        debug!(file = %rel, tags = entry.tags.len(), "Updated tags");
        Ok(TagOutcome {
            filename: rel.to_string(),
            tags: entry.tags.iter().cloned().collect(),
        })
    })
}

fn require_files(files: &[String]) -> Result<()> {
    if files.iter().all(|f| f.trim().is_empty()) {
        return Err(CuratorError::validation("No filenames provided"));
    }
    Ok(())
}

fn run_batch<T>(
    repo: &Repository,
    files: &[String],
    mut each: impl FnMut(&str) -> Result<T>,
) -> BatchReport {
    let mut report = BatchReport::default();
    for raw in files.iter().map(|f| f.trim()).filter(|f| !f.is_empty()) {
        let outcome = repo.resolve_user_path(raw).and_then(|rel| each(&rel));
        report.record(raw, outcome);
    }
    info!(
        updated = report.updated.len(),
        failed = report.failed.len(),
        "Batch finished"
    );
    report
}

/// Apply one decision to many files, one lock acquisition per file.
pub fn status_batch(
    repo: &Repository,
    files: &[String],
    decision: Decision,
    force: bool,
) -> Result<BatchReport> {
    require_files(files)?;
    Ok(run_batch(repo, files, |rel| {
        set_status(repo, rel, decision, force)
    }))
}

/// Apply one tag change to many files, one lock acquisition per file.
pub fn tag_batch(
    repo: &Repository,
    files: &[String],
    add: &[String],
    remove: &[String],
    force: bool,
) -> Result<BatchReport> {
    require_files(files)?;
    if normalize_tags(add).is_empty() && normalize_tags(remove).is_empty() {
        return Err(CuratorError::validation("No tags to add or remove"));
    }
    Ok(run_batch(repo, files, |rel| {
        update_tags(repo, rel, add, remove, force)
    }))
}
