//! Scanning: which files still need a decision.

pub mod patterns;
pub mod scanner;

pub use patterns::{normalize_glob_pattern, PathFilter};
pub use scanner::{
    scan, scan_with_record, FileDescriptor, ScanOptions, ScanPage, SortKey, SortOrder,
};
