//! Applying file operations: filesystem move first, then state commit.
//!
//! Each operation runs under the state lock. If the state write fails after
//! the file was moved, the move is undone before the error is returned.

use super::plan::{plan_delete, plan_move, plan_rename, plan_restore, CollisionPolicy, MovePlan};
use super::probe::RealFs;
use super::trash::prune_empty_dirs;
use crate::error::{IoResultExt, Result};
use crate::repo::Repository;
use crate::state::{now_local, DeleteContext, FileEntry, LockedState, StateRecord, Status};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub filename: String,
    pub trash_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreOutcome {
    pub filename: String,
    pub restored_from: String,
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).at_path(parent)?;
    }
    fs::rename(from, to).at_path(from)
}

/// Move `from` to `to`, then persist `record`; roll the move back if the
/// save fails.
fn move_then_commit(
    repo: &Repository,
    state: &LockedState<'_>,
    record: &StateRecord,
    from: &str,
    to: &str,
) -> Result<()> {
    let src = repo.absolute(from);
    let dst = repo.absolute(to);
    move_file(&src, &dst)?;

    if let Err(err) = state.save(record) {
        match fs::rename(&dst, &src) {
            Ok(()) => warn!(from = %from, to = %to, error = %err, "State write failed, move rolled back"),
            Err(undo) => error!(
                from = %from,
                to = %to,
                error = %err,
                undo_error = %undo,
                "State write failed and the move could not be rolled back"
            ),
        }
        return Err(err);
    }
    Ok(())
}

/// Move a file into the repository trash and mark it deleted.
pub fn delete_to_trash(repo: &Repository, rel: &str) -> Result<DeleteOutcome> {
    let store = repo.store();
    store.with_lock(|state| {
        let mut record = state.load()?;
        let plan = plan_delete(repo, &RealFs, rel)?;
        let now = now_local();
        record.entry_or_default(&plan.rel_path, now).mark_deleted(
            DeleteContext {
                original_path: plan.rel_path.clone(),
                trash_path: plan.trash_path.clone(),
                deleted_at: Some(now),
            },
            now,
        );
        move_then_commit(repo, state, &record, &plan.rel_path, &plan.trash_path)?;
        info!(file = %plan.rel_path, trash = %plan.trash_path, "Moved file to trash");
        Ok(DeleteOutcome {
            filename: plan.rel_path,
            trash_path: plan.trash_path,
        })
    })
}

fn apply_move(
    repo: &Repository,
    state: &LockedState<'_>,
    mut record: StateRecord,
    plan: MovePlan,
) -> Result<MoveOutcome> {
    let now = now_local();
    let mut entry = record
        .remove(&plan.from)
        .unwrap_or_else(|| FileEntry::new(Status::Renamed, now));
    entry.status = Status::Renamed;
    entry.renamed_from = Some(plan.from.clone());
    entry.keep_days = None;
    entry.expiry_date = None;
    entry.delete_context = None;
    entry.touch(now);
    record.insert(plan.to.clone(), entry);

    move_then_commit(repo, state, &record, &plan.from, &plan.to)?;
    info!(from = %plan.from, to = %plan.to, "Renamed file");
    Ok(MoveOutcome {
        old: plan.from,
        new: plan.to,
    })
}

/// Rename a file within its directory.
pub fn rename(
    repo: &Repository,
    rel: &str,
    new_name: &str,
    policy: CollisionPolicy,
) -> Result<MoveOutcome> {
    repo.store().with_lock(|state| {
        let record = state.load()?;
        let plan = plan_rename(repo, &RealFs, &record, rel, new_name, policy)?;
        apply_move(repo, state, record, plan)
    })
}

/// Move a file into another repository directory.
pub fn move_to(
    repo: &Repository,
    rel: &str,
    dest_dir: &str,
    policy: CollisionPolicy,
) -> Result<MoveOutcome> {
    repo.store().with_lock(|state| {
        let record = state.load()?;
        let plan = plan_move(repo, &RealFs, &record, rel, dest_dir, policy)?;
        apply_move(repo, state, record, plan)
    })
}

/// Bring a deleted file back from the trash and requeue it for review.
pub fn restore(repo: &Repository, rel: &str) -> Result<RestoreOutcome> {
    repo.store().with_lock(|state| {
        let mut record = state.load()?;
        let plan = plan_restore(repo, &RealFs, &record, rel)?;
        let now = now_local();

        let mut entry = record
            .remove(&plan.rel_path)
            .unwrap_or_else(|| FileEntry::new(Status::DecideLater, now));
        entry.status = Status::DecideLater;
        entry.delete_context = None;
        entry.keep_days = None;
        entry.expiry_date = None;
        entry.touch(now);
        record.insert(plan.destination.clone(), entry);

        move_then_commit(repo, state, &record, &plan.trash_path, &plan.destination)?;

        if let Some(parent) = repo.absolute(&plan.trash_path).parent() {
            let trash_root = repo.trash_root();
            if parent.starts_with(&trash_root) {
                prune_empty_dirs(&trash_root, parent);
            }
        }
        info!(file = %plan.destination, from = %plan.trash_path, "Restored file from trash");
        Ok(RestoreOutcome {
            filename: plan.destination,
            restored_from: plan.trash_path,
        })
    })
}
