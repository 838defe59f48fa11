//! Error types for curator operations

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Process exit codes shared by every command.
pub mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const UNEXPECTED: u8 = 1;
    pub const FAILED: u8 = 2;
    pub const INVALID_INPUT: u8 = 3;
}

/// Curator error type
#[derive(Error, Debug)]
pub enum CuratorError {
    #[error("{0}")]
    Validation(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Ambiguous restore for {path}: {} trash candidates ({})", .candidates.len(), .candidates.join(", "))]
    Ambiguous { path: String, candidates: Vec<String> },

    #[error("Timed out after {waited_ms}ms waiting for lock {}", .path.display())]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    #[error("State file {} is corrupt and no backup could be loaded: {detail}", .path.display())]
    StateCorrupt { path: PathBuf, detail: String },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Pattern(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl CuratorError {
    pub fn validation(message: impl Into<String>) -> Self {
        CuratorError::Validation(message.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        CuratorError::NotFound(path.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        CuratorError::Conflict(message.into())
    }

    /// Wrap an io error with the path it happened on.
    pub fn io(path: &Path, source: io::Error) -> Self {
        CuratorError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// The process exit code this error maps to.
    pub fn exit_code(&self) -> u8 {
        match self {
            CuratorError::Validation(_) | CuratorError::Pattern(_) | CuratorError::Config(_) => {
                exit_code::INVALID_INPUT
            }
            CuratorError::NotFound(_)
            | CuratorError::Conflict(_)
            | CuratorError::Ambiguous { .. } => exit_code::FAILED,
            CuratorError::LockTimeout { .. }
            | CuratorError::StateCorrupt { .. }
            | CuratorError::Io { .. }
            | CuratorError::Json(_) => exit_code::UNEXPECTED,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CuratorError>;

/// Attach a path to io errors, in the style of `anyhow::Context`.
pub trait IoResultExt<T> {
    fn at_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at_path(self, path: &Path) -> Result<T> {
        self.map_err(|source| CuratorError::io(path, source))
    }
}
