//! Process-level locking of the state file.
//!
//! Every read-modify-write of the state record happens while holding an
//! exclusive advisory lock on `<state file>.lock`. Uses the `fs2` crate for
//! cross-platform file locking (MSRV 1.75 compatible).

use crate::error::CuratorError;
use chrono::Utc;
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Delay between lock attempts while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Errors from lock operations.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("State is locked by another process: {0}")]
    Locked(PathBuf),

    #[error("Failed to create lock file {path}: {source}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to acquire lock {path}: {source}")]
    AcquireFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<LockError> for CuratorError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Locked(path) => CuratorError::LockTimeout { path, waited_ms: 0 },
            LockError::CreateFailed { path, source } | LockError::AcquireFailed { path, source } => {
                CuratorError::Io { path, source }
            }
        }
    }
}

/// A guard holding the exclusive state lock.
///
/// The lock is released when the guard is dropped, including during unwinding.
pub struct StateLockGuard {
    _file: File,
    lock_path: PathBuf,
    sidecar_path: Option<PathBuf>,
}

impl StateLockGuard {
    /// Get the path to the lock file.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

#[derive(Serialize)]
struct LockSidecar {
    pid: u32,
    exe: Option<String>,
    timestamp: String,
}

fn sidecar_path_for(lock_path: &Path) -> PathBuf {
    let mut name = lock_path.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

fn write_lock_sidecar(lock_path: &Path) -> Option<PathBuf> {
    let sidecar = LockSidecar {
        pid: std::process::id(),
        exe: std::env::current_exe().ok().map(|p| p.display().to_string()),
        timestamp: Utc::now().to_rfc3339(),
    };
    let sidecar_path = sidecar_path_for(lock_path);
    match serde_json::to_vec_pretty(&sidecar)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        .and_then(|payload| fs::write(&sidecar_path, payload))
    {
        Ok(()) => Some(sidecar_path),
        Err(e) => {
            warn!(
                "Failed to write lock sidecar {}: {}",
                sidecar_path.display(),
                e
            );
            None
        }
    }
}

impl Drop for StateLockGuard {
    fn drop(&mut self) {
        debug!("Releasing state lock: {}", self.lock_path.display());
        if let Some(path) = &self.sidecar_path {
            if let Err(e) = fs::remove_file(path) {
                debug!("Failed to remove lock sidecar {}: {}", path.display(), e);
            }
        }
        // File is unlocked when closed (fs2 uses flock/LockFileEx)
    }
}

impl std::fmt::Debug for StateLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateLockGuard")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

/// Get the lock file path for a state file: `<state>.lock`.
pub fn lock_path_for(state_path: &Path) -> PathBuf {
    let mut name = state_path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Try to acquire the exclusive lock without waiting.
pub fn try_lock_exclusive(state_path: &Path) -> Result<StateLockGuard, LockError> {
    let lock_path = lock_path_for(state_path);

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|source| LockError::CreateFailed {
            path: lock_path.clone(),
            source,
        })?;

    // Fully qualified: std::fs::File::try_lock_exclusive exists in newer Rust
    // with a different error type.
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            debug!("Acquired state lock: {}", lock_path.display());
            let sidecar_path = write_lock_sidecar(&lock_path);
            Ok(StateLockGuard {
                _file: file,
                lock_path,
                sidecar_path,
            })
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock || is_contention(&e) => {
            Err(LockError::Locked(lock_path))
        }
        Err(source) => Err(LockError::AcquireFailed {
            path: lock_path,
            source,
        }),
    }
}

/// fs2 reports contention as the platform's lock error, which is not always
/// mapped to `WouldBlock`.
fn is_contention(err: &io::Error) -> bool {
    err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Acquire the exclusive lock, polling until `timeout` elapses.
pub fn lock_exclusive_with_timeout(
    state_path: &Path,
    timeout: Duration,
) -> Result<StateLockGuard, CuratorError> {
    let started = Instant::now();
    let mut attempts: u32 = 0;
    loop {
        match try_lock_exclusive(state_path) {
            Ok(guard) => {
                if attempts > 0 {
                    debug!(
                        attempts,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Acquired state lock after waiting"
                    );
                }
                return Ok(guard);
            }
            Err(LockError::Locked(lock_path)) => {
                let waited = started.elapsed();
                if waited >= timeout {
                    warn!(
                        lock = %lock_path.display(),
                        waited_ms = waited.as_millis() as u64,
                        "Gave up waiting for state lock"
                    );
                    return Err(CuratorError::LockTimeout {
                        path: lock_path,
                        waited_ms: waited.as_millis() as u64,
                    });
                }
                attempts += 1;
                thread::sleep(POLL_INTERVAL.min(timeout - waited));
            }
            Err(other) => return Err(other.into()),
        }
    }
}
