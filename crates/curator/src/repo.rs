//! Repository handle and relative path helpers.

use crate::config::{CuratorConfig, CONFIG_FILE_NAME};
use crate::error::{CuratorError, Result};
use crate::state::{StateStore, STATE_FILE_NAME};
use std::path::{Component, Path, PathBuf};

/// A directory under curation.
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
    config: CuratorConfig,
}

impl Repository {
    /// Open a repository, loading `.curator.toml` if present.
    pub fn open(path: &Path) -> Result<Self> {
        validate_repository_path(path)?;
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let config = CuratorConfig::load_for_repository(&root)?;
        Ok(Self { root, config })
    }

    /// Open with an explicit config, skipping the config file.
    pub fn with_config(path: &Path, config: CuratorConfig) -> Result<Self> {
        validate_repository_path(path)?;
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CuratorConfig {
        &self.config
    }

    pub fn store(&self) -> StateStore {
        StateStore::new(&self.root, &self.config)
    }

    pub fn trash_root(&self) -> PathBuf {
        self.root.join(&self.config.trash_dir)
    }

    pub fn ignore_path(&self) -> PathBuf {
        self.root.join(&self.config.ignore_file)
    }

    pub fn rules_path(&self) -> PathBuf {
        let configured = Path::new(&self.config.rules_file);
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            self.root.join(configured)
        }
    }

    /// Absolute path for a normalized relative key.
    pub fn absolute(&self, rel: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in rel.split('/') {
            path.push(part);
        }
        path
    }

    /// Relative, forward-slash key for a path under the root.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let key = normalize_path_to_forward_slashes(rel);
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    /// Normalize a user-supplied path into a state key.
    ///
    /// Absolute paths are accepted when they point inside the root.
    pub fn resolve_user_path(&self, raw: &str) -> Result<String> {
        let trimmed = raw.trim();
        let as_path = Path::new(trimmed);
        let key = if as_path.is_absolute() {
            let canonical = as_path
                .canonicalize()
                .unwrap_or_else(|_| as_path.to_path_buf());
            self.relative(&canonical).ok_or_else(|| {
                CuratorError::validation(format!("Path is outside the repository: {}", trimmed))
            })?
        } else {
            normalize_rel_path(trimmed)?
        };
        if self.is_internal(&key) {
            return Err(CuratorError::validation(format!(
                "Refusing to operate on curator bookkeeping file: {}",
                key
            )));
        }
        Ok(key)
    }

    /// Whether a relative key names one of the curator's own files.
    pub fn is_internal(&self, rel: &str) -> bool {
        let trash = self
            .config
            .trash_dir
            .trim()
            .trim_start_matches("./")
            .trim_matches('/');
        let in_trash = rel
            .strip_prefix(trash)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if in_trash || rel == self.config.ignore_file.trim() {
            return true;
        }
        !rel.contains('/') && (rel.starts_with(STATE_FILE_NAME) || rel == CONFIG_FILE_NAME)
    }
}

/// Check that a repository path exists, is a directory and is readable.
pub fn validate_repository_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(CuratorError::not_found(path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(CuratorError::validation(format!(
            "Not a directory: {}",
            path.display()
        )));
    }
    std::fs::read_dir(path).map_err(|e| CuratorError::io(path, e))?;
    Ok(())
}

/// Convert a relative path to a forward-slash string.
pub fn normalize_path_to_forward_slashes(path: &Path) -> String {
    let mut parts = Vec::new();
    for component in path.components() {
        if let Component::Normal(part) = component {
            parts.push(part.to_string_lossy());
        }
    }
    parts.join("/")
}

/// Normalize a relative path string into a state key.
///
/// Backslashes become `/`, `.` segments and duplicate separators are dropped.
/// Absolute paths and `..` segments are rejected.
pub fn normalize_rel_path(raw: &str) -> Result<String> {
    let unified = raw.trim().replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(CuratorError::validation(format!(
            "Expected a path relative to the repository, got '{}'",
            raw
        )));
    }
    let mut parts = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(CuratorError::validation(format!(
                    "Path escapes the repository: '{}'",
                    raw
                )))
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return Err(CuratorError::validation("Path must not be empty"));
    }
    Ok(parts.join("/"))
}

/// Lenient normalization for keys read from disk: leading `/` and `./` are
/// stripped instead of rejected. Returns `None` for keys that cannot be made
/// relative.
pub fn normalize_stored_key(raw: &str) -> Option<String> {
    let unified = raw.replace('\\', "/");
    normalize_rel_path(unified.trim_start_matches('/')).ok()
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Basename of a relative key.
pub fn file_name_of(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

/// Parent directory of a relative key, or `""` for top-level keys.
pub fn parent_of(rel: &str) -> &str {
    match rel.rfind('/') {
        Some(idx) => &rel[..idx],
        None => "",
    }
}

/// Join a parent directory key and a file name.
pub fn join_rel(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalizes_separators_and_dots() {
        assert_eq!(normalize_rel_path("a.txt").unwrap(), "a.txt");
        assert_eq!(normalize_rel_path("docs\\notes.txt").unwrap(), "docs/notes.txt");
        assert_eq!(normalize_rel_path("./docs//notes.txt").unwrap(), "docs/notes.txt");
    }

    #[test]
    fn rejects_escaping_and_absolute_paths() {
        assert!(normalize_rel_path("../etc/passwd").is_err());
        assert!(normalize_rel_path("docs/../../x").is_err());
        assert!(normalize_rel_path("/etc/passwd").is_err());
        assert!(normalize_rel_path("C:\\Windows").is_err());
        assert!(normalize_rel_path("  ").is_err());
    }

    #[test]
    fn stored_keys_are_made_relative() {
        assert_eq!(normalize_stored_key("/a/b.txt").as_deref(), Some("a/b.txt"));
        assert_eq!(normalize_stored_key("sub\\c.txt").as_deref(), Some("sub/c.txt"));
        assert_eq!(normalize_stored_key("../x"), None);
    }

    #[test]
    fn rel_helpers() {
        assert_eq!(file_name_of("docs/a.txt"), "a.txt");
        assert_eq!(file_name_of("a.txt"), "a.txt");
        assert_eq!(parent_of("docs/sub/a.txt"), "docs/sub");
        assert_eq!(parent_of("a.txt"), "");
        assert_eq!(join_rel("", "a.txt"), "a.txt");
        assert_eq!(join_rel("docs", "a.txt"), "docs/a.txt");
    }

    #[test]
    fn internal_files_are_recognized() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::with_config(temp.path(), CuratorConfig::default()).unwrap();
        assert!(repo.is_internal(".curator_state.json"));
        assert!(repo.is_internal(".curator_state.json.bak.2"));
        assert!(repo.is_internal(".curator_state.json.lock"));
        assert!(repo.is_internal(".curator_trash/a.txt"));
        assert!(repo.is_internal(".curatorignore"));
        assert!(!repo.is_internal("docs/.curator_state.json"));
        assert!(!repo.is_internal("notes.txt"));
        assert!(!repo.is_internal(".curator_trash_old/a.txt"));
    }

    #[test]
    fn nested_trash_dir_is_matched_by_prefix() {
        let temp = TempDir::new().unwrap();
        let config = CuratorConfig {
            trash_dir: "bin/trash/".to_string(),
            ..CuratorConfig::default()
        };
        let repo = Repository::with_config(temp.path(), config).unwrap();
        assert!(repo.is_internal("bin/trash"));
        assert!(repo.is_internal("bin/trash/a.txt"));
        assert!(repo.is_internal("bin/trash/docs/b.txt"));
        assert!(!repo.is_internal("bin/a.txt"));
        assert!(!repo.is_internal("bin/trashy.txt"));
        assert!(!repo.is_internal("bin"));

        std::fs::create_dir_all(temp.path().join("bin/trash")).unwrap();
        std::fs::write(temp.path().join("bin/trash/a.txt"), "x").unwrap();
        assert_eq!(
            repo.resolve_user_path("bin/trash/a.txt").unwrap_err().exit_code(),
            3
        );
    }

    #[test]
    fn resolve_user_path_accepts_absolute_inside_root() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("docs")).unwrap();
        std::fs::write(temp.path().join("docs/a.txt"), "x").unwrap();
        let repo = Repository::with_config(temp.path(), CuratorConfig::default()).unwrap();

        let abs = repo.root().join("docs").join("a.txt");
        let key = repo.resolve_user_path(abs.to_str().unwrap()).unwrap();
        assert_eq!(key, "docs/a.txt");

        let err = repo.resolve_user_path(".curator_state.json").unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_repository_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = Repository::open(&temp.path().join("missing")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
