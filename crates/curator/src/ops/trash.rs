//! The repository trash: `<root>/<trash_dir>/<relative path>`.

use super::probe::FsProbe;
use crate::error::{CuratorError, IoResultExt, Result};
use crate::repo::{
    file_name_of, join_rel, normalize_path_to_forward_slashes, parent_of, Repository,
};
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Trash directory name used by older per-directory layouts.
pub const LEGACY_TRASH_DIR: &str = ".curator_trash";

/// `name (n).ext`, or `name (n)` without an extension.
pub fn disambiguated_name(name: &str, n: usize) -> String {
    let path = Path::new(name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => {
            format!("{} ({}).{}", stem.to_string_lossy(), n, ext.to_string_lossy())
        }
        _ => format!("{} ({})", name, n),
    }
}

/// First free trash location for `rel`, as a repository-relative key.
pub fn trash_destination(repo: &Repository, probe: &dyn FsProbe, rel: &str) -> String {
    let trash_dir = repo.config().trash_dir.trim_end_matches('/').to_string();
    let in_trash = |candidate: &str| join_rel(&trash_dir, candidate);

    let first = in_trash(rel);
    if !probe.exists(&repo.absolute(&first)) {
        return first;
    }
    let parent = parent_of(rel);
    let name = file_name_of(rel);
    (1..)
        .map(|n| in_trash(&join_rel(parent, &disambiguated_name(name, n))))
        .find(|candidate| !probe.exists(&repo.absolute(candidate)))
        .unwrap_or(first)
}

/// Legacy trash candidates for a file deleted before delete contexts were
/// recorded: the root trash tree and the old per-directory trash.
pub fn legacy_candidates(repo: &Repository, probe: &dyn FsProbe, rel: &str) -> Vec<String> {
    let name = OsStr::new(file_name_of(rel));
    let mut found = BTreeSet::new();

    for path in probe.files_named(&repo.trash_root(), name) {
        if let Some(key) = repo.relative(&path) {
            found.insert(key);
        }
    }

    let per_dir = join_rel(&join_rel(parent_of(rel), LEGACY_TRASH_DIR), file_name_of(rel));
    if probe.is_file(&repo.absolute(&per_dir)) {
        found.insert(per_dir);
    }

    found.into_iter().collect()
}

/// Files currently in the trash, relative to the trash root.
pub fn list_trash(repo: &Repository) -> Result<Vec<String>> {
    let root = repo.trash_root();
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root.as_path()).to_path_buf();
            CuratorError::io(&path, e.into())
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(&root) {
            files.push(normalize_path_to_forward_slashes(rel));
        }
    }
    files.sort();
    Ok(files)
}

/// Permanently remove everything in the trash. Returns what was removed.
pub fn empty_trash(repo: &Repository) -> Result<Vec<String>> {
    let files = list_trash(repo)?;
    let root = repo.trash_root();
    if root.is_dir() {
        fs::remove_dir_all(&root).at_path(&root)?;
        info!(trash = %root.display(), removed = files.len(), "Emptied trash");
    }
    Ok(files)
}

/// Remove empty directories from `start` upwards, stopping at `stop_at`
/// (which is removed too when it ends up empty).
pub fn prune_empty_dirs(stop_at: &Path, start: &Path) {
    let mut current = Some(start);
    while let Some(dir) = current {
        if !dir.starts_with(stop_at) {
            break;
        }
        match fs::remove_dir(dir) {
            Ok(()) => debug!(dir = %dir.display(), "Removed empty trash directory"),
            Err(_) => break,
        }
        if dir == stop_at {
            break;
        }
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CuratorConfig;
    use crate::ops::probe::{fake::FakeFs, RealFs};
    use tempfile::TempDir;

    fn repo(temp: &TempDir) -> Repository {
        Repository::with_config(temp.path(), CuratorConfig::default()).unwrap()
    }

    #[test]
    fn disambiguates_before_extension() {
        assert_eq!(disambiguated_name("dup.txt", 1), "dup (1).txt");
        assert_eq!(disambiguated_name("archive.tar.gz", 2), "archive.tar (2).gz");
        assert_eq!(disambiguated_name("README", 3), "README (3)");
        assert_eq!(disambiguated_name(".env", 1), ".env (1)");
    }

    #[test]
    fn destination_keeps_relative_position_and_skips_taken_names() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);
        let trash = repo.trash_root();
        let probe = FakeFs::with_files([
            trash.join("docs").join("dup.txt"),
            trash.join("docs").join("dup (1).txt"),
        ]);

        assert_eq!(
            trash_destination(&repo, &probe, "docs/dup.txt"),
            ".curator_trash/docs/dup (2).txt"
        );
        assert_eq!(
            trash_destination(&repo, &probe, "other/dup.txt"),
            ".curator_trash/other/dup.txt"
        );
    }

    #[test]
    fn legacy_candidates_cover_both_layouts() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);
        let probe = FakeFs::with_files([
            repo.trash_root().join("a.txt"),
            repo.root().join("docs").join(".curator_trash").join("a.txt"),
            repo.root().join("docs").join("b.txt"),
        ]);

        let found = legacy_candidates(&repo, &probe, "docs/a.txt");
        assert_eq!(
            found,
            vec![".curator_trash/a.txt".to_string(), "docs/.curator_trash/a.txt".to_string()]
        );
        assert!(legacy_candidates(&repo, &probe, "zzz.txt").is_empty());
    }

    #[test]
    fn list_and_empty_trash() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);
        assert!(list_trash(&repo).unwrap().is_empty());

        fs::create_dir_all(repo.trash_root().join("sub")).unwrap();
        fs::write(repo.trash_root().join("b.txt"), "b").unwrap();
        fs::write(repo.trash_root().join("sub/a.txt"), "a").unwrap();

        assert_eq!(list_trash(&repo).unwrap(), vec!["b.txt", "sub/a.txt"]);
        let removed = empty_trash(&repo).unwrap();
        assert_eq!(removed, vec!["b.txt", "sub/a.txt"]);
        assert!(!repo.trash_root().exists());
        assert!(RealFs.files_named(&repo.trash_root(), OsStr::new("b.txt")).is_empty());
    }

    #[test]
    fn prune_stops_at_non_empty_directory() {
        let temp = TempDir::new().unwrap();
        let trash = temp.path().join("trash");
        fs::create_dir_all(trash.join("a/b/c")).unwrap();
        fs::write(trash.join("a/keep.txt"), "k").unwrap();

        prune_empty_dirs(&trash, &trash.join("a/b/c"));
        assert!(!trash.join("a/b").exists());
        assert!(trash.join("a").exists());
    }
}
