//! File operations and decision updates.
//!
//! Filesystem effects are split into a pure planning step over [`FsProbe`]
//! and an apply step that moves the file and commits state under one lock.

pub mod decisions;
pub mod expiry;
pub mod file_ops;
pub mod maintenance;
pub mod plan;
pub mod probe;
pub mod trash;

pub use decisions::{
    normalize_tags, set_status, status_batch, tag_batch, update_tags, BatchItem, BatchReport,
    StatusOutcome, TagOutcome,
};
pub use expiry::{expired_entries, mark_expired, resolve_expired, ExpiredDetail};
pub use file_ops::{delete_to_trash, move_to, rename, restore, DeleteOutcome, MoveOutcome, RestoreOutcome};
pub use maintenance::{prune, PruneReport};
pub use plan::{
    plan_delete, plan_move, plan_rename, plan_restore, CollisionPolicy, DeletePlan, MovePlan,
    RestorePlan,
};
pub use probe::{FsProbe, RealFs};
pub use trash::{empty_trash, list_trash};
