//! Per-repository configuration (`.curator.toml`)

use crate::error::{CuratorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Name of the optional config file at the repository root.
pub const CONFIG_FILE_NAME: &str = ".curator.toml";

/// Environment override for the lock timeout, in milliseconds.
pub const LOCK_TIMEOUT_ENV: &str = "CURATOR_LOCK_TIMEOUT_MS";

/// Repository configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CuratorConfig {
    /// How long to wait for the state lock before giving up
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Number of rotated state backups to keep
    #[serde(default = "default_backup_count")]
    pub backup_count: usize,

    /// Trash directory, relative to the repository root
    #[serde(default = "default_trash_dir")]
    pub trash_dir: String,

    /// Rules file, relative to the repository root unless absolute
    #[serde(default = "default_rules_file")]
    pub rules_file: String,

    /// Ignore file, relative to the repository root
    #[serde(default = "default_ignore_file")]
    pub ignore_file: String,

    /// List dotfiles during scans
    #[serde(default)]
    pub include_hidden: bool,
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_backup_count() -> usize {
    3
}

fn default_trash_dir() -> String {
    ".curator_trash".to_string()
}

fn default_rules_file() -> String {
    "curator_rules.json".to_string()
}

fn default_ignore_file() -> String {
    ".curatorignore".to_string()
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            backup_count: default_backup_count(),
            trash_dir: default_trash_dir(),
            rules_file: default_rules_file(),
            ignore_file: default_ignore_file(),
            include_hidden: false,
        }
    }
}

impl CuratorConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CuratorError::io(path, e))?;
        let config: CuratorConfig = toml::from_str(&content)
            .map_err(|e| CuratorError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `<root>/.curator.toml` if present, then apply env overrides.
    pub fn load_for_repository(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        let mut config = if path.is_file() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        if let Ok(raw) = std::env::var(LOCK_TIMEOUT_ENV) {
            config.lock_timeout_ms = raw.trim().parse().map_err(|_| {
                CuratorError::Config(format!("{} must be an integer, got '{}'", LOCK_TIMEOUT_ENV, raw))
            })?;
        }
        Ok(config)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("trash_dir", &self.trash_dir),
            ("ignore_file", &self.ignore_file),
        ] {
            let trimmed = value.trim();
            if trimmed.is_empty() || Path::new(trimmed).is_absolute() || trimmed.contains("..") {
                return Err(CuratorError::Config(format!(
                    "{} must be a relative path inside the repository, got '{}'",
                    key, value
                )));
            }
        }
        if self.rules_file.trim().is_empty() {
            return Err(CuratorError::Config("rules_file must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = CuratorConfig::load_for_repository(temp.path()).unwrap();
        assert_eq!(config.backup_count, 3);
        assert_eq!(config.trash_dir, ".curator_trash");
        assert_eq!(config.rules_file, "curator_rules.json");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "backup_count = 5\ninclude_hidden = true\n",
        )
        .unwrap();

        let config = CuratorConfig::load(&temp.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config.backup_count, 5);
        assert!(config.include_hidden);
        assert_eq!(config.lock_timeout_ms, 5_000);
    }

    #[test]
    fn rejects_trash_outside_repository() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "trash_dir = \"../elsewhere\"\n").unwrap();

        let err = CuratorConfig::load(&path).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn rejects_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "trash = \"x\"\n").unwrap();

        assert!(matches!(
            CuratorConfig::load(&path),
            Err(CuratorError::Config(_))
        ));
    }
}
