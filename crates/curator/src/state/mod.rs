//! Persistent curation state.
//!
//! One JSON object per repository maps relative paths to [`FileEntry`]
//! records. All access goes through [`StateStore`], which brackets every
//! read-modify-write with an exclusive lock and replaces the file atomically.

pub mod entry;
pub mod lock;
pub mod record;
pub mod store;

pub use entry::{now_local, timestamp, Decision, DeleteContext, FileEntry, Status};
pub use lock::{lock_path_for, StateLockGuard};
pub use record::{migrate, StateRecord, CURRENT_SCHEMA_VERSION, SCHEMA_VERSION_KEY};
pub use store::{LockedState, StateStore, STATE_FILE_NAME};
