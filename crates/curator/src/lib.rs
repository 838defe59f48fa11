//! Curator: incremental file curation.
//!
//! A repository is any directory. Decisions about its files (keep, keep for a
//! while, decide later, deleted, renamed) are persisted in a JSON state record
//! at the repository root so repeated scans only surface files that still need
//! attention.
//!
//! Layout:
//! - [`state`]: the state record, its migration, locking and atomic persistence
//! - [`scan`]: traversal, glob filters, curated-file suppression, sort and paging
//! - [`ops`]: rename, move, delete-to-trash, restore, expiry and decisions
//! - [`rules`]: first-match-wins condition/action rules over file attributes

pub mod config;
pub mod error;
pub mod ops;
pub mod repo;
pub mod rules;
pub mod scan;
pub mod state;

pub use config::CuratorConfig;
pub use error::{CuratorError, Result};
pub use repo::Repository;
pub use state::{Decision, FileEntry, StateRecord, StateStore, Status};
