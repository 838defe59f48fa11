//! Locked, atomic persistence of the state record.

use super::lock::{lock_exclusive_with_timeout, StateLockGuard};
use super::record::StateRecord;
use crate::config::CuratorConfig;
use crate::error::{CuratorError, IoResultExt, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{Builder, NamedTempFile, TempPath};
use tracing::{debug, error, info, warn};

/// State file name at the repository root.
pub const STATE_FILE_NAME: &str = ".curator_state.json";

/// Loads and saves one repository's state record.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
    state_path: PathBuf,
    lock_timeout: Duration,
    backup_count: usize,
}

/// Access to the state record while the lock is held.
#[derive(Debug)]
pub struct LockedState<'a> {
    store: &'a StateStore,
    _guard: StateLockGuard,
}

impl LockedState<'_> {
    pub fn load(&self) -> Result<StateRecord> {
        self.store.load_locked()
    }

    pub fn save(&self, record: &StateRecord) -> Result<()> {
        let staged = self.store.stage(record)?;
        self.store.commit(staged)
    }
}

/// A fully written and synced temp file that has not replaced the state yet.
pub(crate) struct StagedWrite {
    temp: NamedTempFile,
}

impl StateStore {
    pub fn new(root: &Path, config: &CuratorConfig) -> Self {
        Self {
            dir: root.to_path_buf(),
            state_path: root.join(STATE_FILE_NAME),
            lock_timeout: config.lock_timeout(),
            backup_count: config.backup_count,
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Rotated backup `n`, 1 being the newest.
    pub fn backup_path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("{}.bak.{}", STATE_FILE_NAME, n))
    }

    /// Single backup written by older versions.
    fn legacy_backup_path(&self) -> PathBuf {
        self.dir.join(format!("{}.bak", STATE_FILE_NAME))
    }

    /// Run `f` while holding the exclusive state lock.
    pub fn with_lock<T>(&self, f: impl FnOnce(&LockedState<'_>) -> Result<T>) -> Result<T> {
        let guard = lock_exclusive_with_timeout(&self.state_path, self.lock_timeout)?;
        let locked = LockedState {
            store: self,
            _guard: guard,
        };
        f(&locked)
    }

    /// Load a snapshot under the lock.
    pub fn read(&self) -> Result<StateRecord> {
        self.with_lock(|state| state.load())
    }

    /// Locked load, mutate, save. Nothing is written if `f` fails.
    pub fn update<T>(&self, f: impl FnOnce(&mut StateRecord) -> Result<T>) -> Result<T> {
        self.with_lock(|state| {
            let mut record = state.load()?;
            let out = f(&mut record)?;
            state.save(&record)?;
            Ok(out)
        })
    }

    fn load_locked(&self) -> Result<StateRecord> {
        let bytes = match fs::read(&self.state_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.state_path.display(), "No state file, starting empty");
                return Ok(StateRecord::new());
            }
            Err(e) => return Err(CuratorError::io(&self.state_path, e)),
        };

        match StateRecord::from_json_slice(&bytes) {
            Ok(record) => Ok(record),
            Err(primary_err) => {
                warn!(
                    path = %self.state_path.display(),
                    error = %primary_err,
                    "State file is unreadable, trying backups"
                );
                self.recover_from_backups().ok_or_else(|| CuratorError::StateCorrupt {
                    path: self.state_path.clone(),
                    detail: primary_err.to_string(),
                })
            }
        }
    }

    fn recover_from_backups(&self) -> Option<StateRecord> {
        let candidates = (1..=self.backup_count.max(1))
            .map(|n| self.backup_path(n))
            .chain(std::iter::once(self.legacy_backup_path()));
        for path in candidates {
            let Ok(bytes) = fs::read(&path) else {
                continue;
            };
            match StateRecord::from_json_slice(&bytes) {
                Ok(record) => {
                    warn!(backup = %path.display(), "Recovered state from backup");
                    return Some(record);
                }
                Err(err) => {
                    debug!(backup = %path.display(), error = %err, "Backup is unreadable");
                }
            }
        }
        None
    }

    fn temp_builder() -> Builder<'static, 'static> {
        let mut builder = Builder::new();
        builder.prefix(".curator_state.json.").suffix(".tmp");
        builder
    }

    /// Serialize into a synced temp file next to the state file.
    pub(crate) fn stage(&self, record: &StateRecord) -> Result<StagedWrite> {
        let payload = record.to_json_string()?;
        let mut temp = Self::temp_builder().tempfile_in(&self.dir).at_path(&self.dir)?;
        temp.write_all(payload.as_bytes()).at_path(temp.path())?;
        temp.as_file().sync_all().at_path(temp.path())?;
        Ok(StagedWrite { temp })
    }

    /// Rotate backups and atomically replace the state file.
    ///
    /// If the state file cannot be replaced, the rotation is undone so the
    /// previous backups stay exactly as they were.
    pub(crate) fn commit(&self, staged: StagedWrite) -> Result<()> {
        let rotation = if self.backup_count > 0 && self.state_path.exists() {
            // Copy first so a failed copy leaves the existing backups in place.
            let mut backup = Self::temp_builder().tempfile_in(&self.dir).at_path(&self.dir)?;
            let mut current = File::open(&self.state_path).at_path(&self.state_path)?;
            io::copy(&mut current, &mut backup).at_path(backup.path())?;
            backup.as_file().sync_all().at_path(backup.path())?;
            Some(self.rotate_in(backup)?)
        } else {
            None
        };

        if let Err(e) = staged.temp.persist(&self.state_path) {
            if let Some(rotation) = rotation {
                self.undo_rotation(rotation);
            }
            return Err(CuratorError::io(&self.state_path, e.error));
        }
        // Dropping the rotation deletes the retired oldest backup.
        drop(rotation);
        sync_dir(&self.dir);
        info!(path = %self.state_path.display(), "Saved state");
        Ok(())
    }

    /// Shift `.bak.n` to `.bak.n+1` and install `backup` as `.bak.1`.
    fn rotate_in(&self, backup: NamedTempFile) -> Result<Rotation> {
        let mut rotation = Rotation::default();
        if let Err(err) = self.shift_backups(backup, &mut rotation) {
            self.undo_rotation(rotation);
            return Err(err);
        }
        Ok(rotation)
    }

    fn shift_backups(&self, backup: NamedTempFile, rotation: &mut Rotation) -> Result<()> {
        let oldest = self.backup_path(self.backup_count);
        if oldest.exists() {
            let parked = Self::temp_builder()
                .tempfile_in(&self.dir)
                .at_path(&self.dir)?
                .into_temp_path();
            fs::rename(&oldest, &parked).at_path(&oldest)?;
            rotation.retired = Some(parked);
        }
        for idx in (1..self.backup_count).rev() {
            let src = self.backup_path(idx);
            if src.exists() {
                fs::rename(&src, self.backup_path(idx + 1)).at_path(&src)?;
                rotation.shifted.push(idx);
            }
        }
        let newest = self.backup_path(1);
        backup
            .persist(&newest)
            .map_err(|e| CuratorError::io(&newest, e.error))?;
        rotation.installed = true;
        Ok(())
    }

    /// Put every backup back where it was before [`Self::rotate_in`].
    fn undo_rotation(&self, mut rotation: Rotation) {
        let mut restore = || -> io::Result<()> {
            if rotation.installed {
                fs::remove_file(self.backup_path(1))?;
            }
            for idx in rotation.shifted.iter().rev() {
                fs::rename(self.backup_path(idx + 1), self.backup_path(*idx))?;
            }
            if let Some(parked) = rotation.retired.take() {
                let parked = parked.keep().map_err(|e| e.error)?;
                fs::rename(&parked, self.backup_path(self.backup_count))?;
            }
            Ok(())
        };
        if let Err(e) = restore() {
            error!(dir = %self.dir.display(), error = %e, "Could not restore state backups");
        }
    }
}

/// Backups moved for a pending save.
#[derive(Default)]
struct Rotation {
    /// The previous oldest backup, parked under a temp name until the save lands.
    retired: Option<TempPath>,
    /// Slots moved from `n` to `n + 1`, in the order they were moved.
    shifted: Vec<usize>,
    /// Whether `.bak.1` now holds the new backup.
    installed: bool,
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!(dir = %dir.display(), error = %e, "Directory sync failed");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
