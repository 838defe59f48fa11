//! Planning: decide what a file operation would do without touching anything.

use super::probe::FsProbe;
use super::trash::{disambiguated_name, legacy_candidates, trash_destination};
use crate::error::{CuratorError, Result};
use crate::repo::{file_name_of, join_rel, normalize_rel_path, parent_of, Repository};
use crate::state::{StateRecord, Status};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// What to do when a destination name is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Abort with a conflict.
    #[default]
    Fail,
    /// Append ` (n)` before the extension.
    Disambiguate,
}

impl FromStr for CollisionPolicy {
    type Err = CuratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(CollisionPolicy::Fail),
            "disambiguate" | "suffix" => Ok(CollisionPolicy::Disambiguate),
            other => Err(CuratorError::validation(format!(
                "Invalid collision policy '{}'. Allowed: fail, disambiguate",
                other
            ))),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollisionPolicy::Fail => f.write_str("fail"),
            CollisionPolicy::Disambiguate => f.write_str("disambiguate"),
        }
    }
}

/// Move of a file to a new repository-relative key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovePlan {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletePlan {
    pub rel_path: String,
    /// Repository-relative destination inside the trash
    pub trash_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestorePlan {
    /// State key of the deleted entry
    pub rel_path: String,
    /// Repository-relative file inside the trash
    pub trash_path: String,
    /// Where the file goes back to
    pub destination: String,
}

fn require_file(repo: &Repository, probe: &dyn FsProbe, rel: &str) -> Result<()> {
    if probe.is_file(&repo.absolute(rel)) {
        Ok(())
    } else {
        Err(CuratorError::not_found(rel))
    }
}

/// A key is taken when a file sits there or a deleted entry still needs it
/// to find its way back out of the trash.
fn is_taken(repo: &Repository, probe: &dyn FsProbe, record: &StateRecord, key: &str) -> bool {
    probe.exists(&repo.absolute(key))
        || record
            .get(key)
            .is_some_and(|entry| entry.status == Status::Deleted && entry.delete_context.is_some())
}

fn resolve_collision(
    repo: &Repository,
    probe: &dyn FsProbe,
    record: &StateRecord,
    candidate: String,
    policy: CollisionPolicy,
) -> Result<String> {
    if !is_taken(repo, probe, record, &candidate) {
        return Ok(candidate);
    }
    match policy {
        CollisionPolicy::Fail => Err(CuratorError::conflict(format!(
            "Destination already exists: {}",
            candidate
        ))),
        CollisionPolicy::Disambiguate => {
            let parent = parent_of(&candidate);
            let name = file_name_of(&candidate);
            let free = (1..)
                .map(|n| join_rel(parent, &disambiguated_name(name, n)))
                .find(|c| !is_taken(repo, probe, record, c))
                .unwrap_or_else(|| candidate.clone());
            Ok(free)
        }
    }
}

fn validate_new_name(new_name: &str) -> Result<&str> {
    let name = new_name.trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(CuratorError::validation("New name must be a non-empty file name"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(CuratorError::validation(format!(
            "New name must not contain path separators: '{}'",
            new_name
        )));
    }
    Ok(name)
}

fn reject_internal(repo: &Repository, rel: &str) -> Result<()> {
    if repo.is_internal(rel) {
        return Err(CuratorError::validation(format!(
            "Destination is reserved for curator bookkeeping: {}",
            rel
        )));
    }
    Ok(())
}

/// Plan moving `rel` into the trash.
pub fn plan_delete(repo: &Repository, probe: &dyn FsProbe, rel: &str) -> Result<DeletePlan> {
    require_file(repo, probe, rel)?;
    Ok(DeletePlan {
        rel_path: rel.to_string(),
        trash_path: trash_destination(repo, probe, rel),
    })
}

/// Plan renaming `rel` within its directory.
pub fn plan_rename(
    repo: &Repository,
    probe: &dyn FsProbe,
    record: &StateRecord,
    rel: &str,
    new_name: &str,
    policy: CollisionPolicy,
) -> Result<MovePlan> {
    let name = validate_new_name(new_name)?;
    require_file(repo, probe, rel)?;
    let candidate = join_rel(parent_of(rel), name);
    if candidate == rel {
        return Err(CuratorError::validation(format!(
            "'{}' already has that name",
            rel
        )));
    }
    reject_internal(repo, &candidate)?;
    let to = resolve_collision(repo, probe, record, candidate, policy)?;
    Ok(MovePlan {
        from: rel.to_string(),
        to,
    })
}

/// Plan moving `rel` into another repository directory (`""` or `.` is the root).
pub fn plan_move(
    repo: &Repository,
    probe: &dyn FsProbe,
    record: &StateRecord,
    rel: &str,
    dest_dir: &str,
    policy: CollisionPolicy,
) -> Result<MovePlan> {
    require_file(repo, probe, rel)?;
    let dest = match dest_dir.trim() {
        "" | "." | "./" | "/" => String::new(),
        other => normalize_rel_path(other)?,
    };
    if !dest.is_empty() {
        reject_internal(repo, &dest)?;
        if probe.is_file(&repo.absolute(&dest)) {
            return Err(CuratorError::conflict(format!(
                "Move destination is a file, not a directory: {}",
                dest
            )));
        }
    }
    let candidate = join_rel(&dest, file_name_of(rel));
    if candidate == rel {
        return Err(CuratorError::validation(format!(
            "'{}' is already in '{}'",
            rel,
            if dest.is_empty() { "." } else { dest.as_str() }
        )));
    }
    reject_internal(repo, &candidate)?;
    let to = resolve_collision(repo, probe, record, candidate, policy)?;
    Ok(MovePlan {
        from: rel.to_string(),
        to,
    })
}

/// Plan restoring a deleted file.
///
/// Uses the recorded delete context; entries without one fall back to a
/// basename search of the trash locations.
pub fn plan_restore(
    repo: &Repository,
    probe: &dyn FsProbe,
    record: &StateRecord,
    rel: &str,
) -> Result<RestorePlan> {
    let context = record.get(rel).and_then(|entry| entry.delete_context.as_ref());
    let (trash_path, destination) = match context {
        Some(ctx) => {
            if !probe.is_file(&repo.absolute(&ctx.trash_path)) {
                return Err(CuratorError::not_found(format!(
                    "{} (expected in trash at {})",
                    rel, ctx.trash_path
                )));
            }
            let destination = normalize_rel_path(&ctx.original_path).unwrap_or_else(|_| rel.to_string());
            (ctx.trash_path.clone(), destination)
        }
        None => {
            let mut candidates = legacy_candidates(repo, probe, rel);
            match candidates.len() {
                0 => {
                    return Err(CuratorError::not_found(format!(
                        "{} (no matching file in trash)",
                        rel
                    )))
                }
                1 => (candidates.remove(0), rel.to_string()),
                _ => {
                    return Err(CuratorError::Ambiguous {
                        path: rel.to_string(),
                        candidates,
                    })
                }
            }
        }
    };

    if probe.exists(&repo.absolute(&destination)) {
        return Err(CuratorError::conflict(format!(
            "Cannot restore {}: destination already exists",
            destination
        )));
    }

    Ok(RestorePlan {
        rel_path: rel.to_string(),
        trash_path,
        destination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CuratorConfig;
    use crate::ops::probe::fake::FakeFs;
    use crate::state::{now_local, DeleteContext};
    use tempfile::TempDir;

    fn repo(temp: &TempDir) -> Repository {
        Repository::with_config(temp.path(), CuratorConfig::default()).unwrap()
    }

    #[test]
    fn delete_plan_requires_existing_file() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);
        let probe = FakeFs::with_files([repo.absolute("docs/a.txt")]);

        let plan = plan_delete(&repo, &probe, "docs/a.txt").unwrap();
        assert_eq!(plan.trash_path, ".curator_trash/docs/a.txt");

        let err = plan_delete(&repo, &probe, "docs/missing.txt").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn rename_plan_checks_name_and_collisions() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);
        let probe = FakeFs::with_files([repo.absolute("d/a.txt"), repo.absolute("d/b.txt")]);
        let empty = StateRecord::new();

        let plan = plan_rename(&repo, &probe, &empty, "d/a.txt", "c.txt", CollisionPolicy::Fail).unwrap();
        assert_eq!(plan.to, "d/c.txt");

        let err = plan_rename(&repo, &probe, &empty, "d/a.txt", "b.txt", CollisionPolicy::Fail).unwrap_err();
        assert!(matches!(err, CuratorError::Conflict(_)));

        let plan =
            plan_rename(&repo, &probe, &empty, "d/a.txt", "b.txt", CollisionPolicy::Disambiguate).unwrap();
        assert_eq!(plan.to, "d/b (1).txt");

        for bad in ["", "..", "x/y.txt", "x\\y.txt"] {
            let err = plan_rename(&repo, &probe, &empty, "d/a.txt", bad, CollisionPolicy::Fail).unwrap_err();
            assert_eq!(err.exit_code(), 3, "name {:?}", bad);
        }
        assert_eq!(
            plan_rename(&repo, &probe, &empty, "d/a.txt", "a.txt", CollisionPolicy::Fail)
                .unwrap_err()
                .exit_code(),
            3
        );
    }

    #[test]
    fn move_plan_targets_directory() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);
        let probe = FakeFs::with_files([repo.absolute("inbox/a.txt"), repo.absolute("blocker")]);
        let empty = StateRecord::new();

        let plan = plan_move(&repo, &probe, &empty, "inbox/a.txt", "archive/2024", CollisionPolicy::Fail)
            .unwrap();
        assert_eq!(plan.to, "archive/2024/a.txt");

        let plan = plan_move(&repo, &probe, &empty, "inbox/a.txt", ".", CollisionPolicy::Fail).unwrap();
        assert_eq!(plan.to, "a.txt");

        assert!(plan_move(&repo, &probe, &empty, "inbox/a.txt", "blocker", CollisionPolicy::Fail).is_err());
        assert_eq!(
            plan_move(&repo, &probe, &empty, "inbox/a.txt", ".curator_trash", CollisionPolicy::Fail)
                .unwrap_err()
                .exit_code(),
            3
        );
        assert_eq!(
            plan_move(&repo, &probe, &empty, "inbox/a.txt", "../out", CollisionPolicy::Fail)
                .unwrap_err()
                .exit_code(),
            3
        );
    }

    #[test]
    fn deleted_entry_with_trash_context_reserves_its_key() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);
        let now = now_local();
        let mut record = StateRecord::new();
        record.entry_or_default("d/b.txt", now).mark_deleted(
            DeleteContext {
                original_path: "d/b.txt".into(),
                trash_path: ".curator_trash/d/b.txt".into(),
                deleted_at: Some(now),
            },
            now,
        );
        record.entry_or_default("d/c.txt", now);
        let probe = FakeFs::with_files([
            repo.absolute("d/a.txt"),
            repo.absolute(".curator_trash/d/b.txt"),
        ]);

        let err =
            plan_rename(&repo, &probe, &record, "d/a.txt", "b.txt", CollisionPolicy::Fail).unwrap_err();
        assert!(matches!(err, CuratorError::Conflict(_)));
        assert_eq!(err.exit_code(), 2);

        let plan = plan_rename(&repo, &probe, &record, "d/a.txt", "b.txt", CollisionPolicy::Disambiguate)
            .unwrap();
        assert_eq!(plan.to, "d/b (1).txt");

        let plan = plan_move(&repo, &probe, &record, "d/a.txt", "e", CollisionPolicy::Fail).unwrap();
        assert_eq!(plan.to, "e/a.txt");

        // A live entry without a file on disk does not block the name.
        let plan =
            plan_rename(&repo, &probe, &record, "d/a.txt", "c.txt", CollisionPolicy::Fail).unwrap();
        assert_eq!(plan.to, "d/c.txt");
    }

    #[test]
    fn restore_plan_uses_delete_context() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);
        let now = now_local();
        let mut record = StateRecord::new();
        record.entry_or_default("docs/a.txt", now).mark_deleted(
            DeleteContext {
                original_path: "docs/a.txt".into(),
                trash_path: ".curator_trash/docs/a (1).txt".into(),
                deleted_at: Some(now),
            },
            now,
        );
        let probe = FakeFs::with_files([
            repo.absolute(".curator_trash/docs/a (1).txt"),
            repo.absolute(".curator_trash/docs/a.txt"),
        ]);

        let plan = plan_restore(&repo, &probe, &record, "docs/a.txt").unwrap();
        assert_eq!(plan.trash_path, ".curator_trash/docs/a (1).txt");
        assert_eq!(plan.destination, "docs/a.txt");
    }

    #[test]
    fn restore_plan_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);
        let probe = FakeFs::with_files([
            repo.absolute(".curator_trash/a.txt"),
            repo.absolute("a.txt"),
        ]);
        let err = plan_restore(&repo, &probe, &StateRecord::new(), "a.txt").unwrap_err();
        assert!(matches!(err, CuratorError::Conflict(_)));
    }

    #[test]
    fn legacy_restore_reports_ambiguity() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);
        let probe = FakeFs::with_files([
            repo.absolute(".curator_trash/x/a.txt"),
            repo.absolute(".curator_trash/y/a.txt"),
        ]);
        let err = plan_restore(&repo, &probe, &StateRecord::new(), "a.txt").unwrap_err();
        match err {
            CuratorError::Ambiguous { candidates, .. } => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }

        let probe = FakeFs::default();
        assert_eq!(
            plan_restore(&repo, &probe, &StateRecord::new(), "a.txt")
                .unwrap_err()
                .exit_code(),
            2
        );
    }
}
