//! State garbage collection.

use crate::error::Result;
use crate::repo::Repository;
use crate::state::{FileEntry, Status};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub removed: Vec<String>,
    pub count: usize,
    pub dry_run: bool,
}

fn is_stale(repo: &Repository, key: &str, entry: &FileEntry) -> bool {
    if repo.absolute(key).exists() {
        return false;
    }
    match (&entry.status, &entry.delete_context) {
        (Status::Deleted, Some(ctx)) => !repo.absolute(&ctx.trash_path).exists(),
        _ => true,
    }
}

/// Drop entries whose file is gone. Deleted entries stay while their trash
/// copy is still restorable.
pub fn prune(repo: &Repository, dry_run: bool) -> Result<PruneReport> {
    let removed = repo.store().with_lock(|state| {
        let mut record = state.load()?;
        let stale: Vec<String> = record
            .iter()
            .filter(|(key, entry)| is_stale(repo, key, entry))
            .map(|(key, _)| key.clone())
            .collect();
        if !dry_run && !stale.is_empty() {
            for key in &stale {
                record.remove(key);
            }
            state.save(&record)?;
        }
        Ok(stale)
    })?;
    info!(count = removed.len(), dry_run, "Pruned stale entries");
    Ok(PruneReport {
        count: removed.len(),
        removed,
        dry_run,
    })
}
