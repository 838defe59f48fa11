//! Repository traversal, suppression of curated files, sort and paging.

use super::patterns::{read_ignore_file, PathFilter};
use crate::error::{CuratorError, Result};
use crate::repo::{file_name_of, Repository};
use crate::state::{FileEntry, StateRecord, Status};
use chrono::{DateTime, FixedOffset};
use ignore::WalkBuilder;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Sort key for scan results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Date,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Size => "size",
            SortKey::Date => "date",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = CuratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "size" => Ok(SortKey::Size),
            "date" | "mtime" | "modified" => Ok(SortKey::Date),
            other => Err(CuratorError::validation(format!(
                "Invalid sort key '{}'. Allowed: name, size, date",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = CuratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(CuratorError::validation(format!(
                "Invalid sort order '{}'. Allowed: asc, desc",
                other
            ))),
        }
    }
}

/// Scan configuration
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub recursive: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// List dotfiles and dot-directories
    pub include_hidden: bool,
    /// Relist `keep` files whose expiry has passed
    pub include_expired: bool,
    /// Case-insensitive substring over path and tags
    pub filter: Option<String>,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
    pub offset: usize,
    /// `None` means no limit
    pub limit: Option<usize>,
}

/// A file surfaced by a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    /// Forward-slash path relative to the repository root
    pub path: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub status: Option<Status>,
    pub tags: Vec<String>,
}

impl FileDescriptor {
    pub fn file_name(&self) -> &str {
        file_name_of(&self.path)
    }
}

/// One page of scan results plus totals.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub files: Vec<FileDescriptor>,
    /// Visible files before status and glob filtering
    pub raw_total: usize,
    /// Files passing every filter, before paging
    pub filtered_total: usize,
}

/// Scan a repository, reading the state under the lock first.
pub fn scan(repo: &Repository, options: &ScanOptions) -> Result<ScanPage> {
    let record = repo.store().read()?;
    scan_with_record(repo, &record, options, crate::state::now_local())
}

/// Scan against an already loaded state snapshot.
pub fn scan_with_record(
    repo: &Repository,
    record: &StateRecord,
    options: &ScanOptions,
    now: DateTime<FixedOffset>,
) -> Result<ScanPage> {
    let ignore_patterns = read_ignore_file(&repo.ignore_path())?;
    let filter = PathFilter::new(&options.include, &options.exclude, &ignore_patterns)?;
    let term = options
        .filter
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase);

    info!(
        root = %repo.root().display(),
        recursive = options.recursive,
        "Starting scan"
    );

    let visible = walk_visible(repo, options)?;
    let raw_total = visible.len();

    let mut matched: Vec<FileDescriptor> = visible
        .into_iter()
        .filter(|file| {
            let entry = record.get(&file.path);
            !entry.map_or(false, |entry| is_suppressed(repo, entry, options, now))
        })
        .filter(|file| filter.allows(&file.path))
        .map(|mut file| {
            if let Some(entry) = record.get(&file.path) {
                file.status = Some(entry.status);
                file.tags = entry.tags.iter().cloned().collect();
            }
            file
        })
        .filter(|file| term.as_deref().map_or(true, |term| matches_term(file, term)))
        .collect();

    let filtered_total = matched.len();
    sort_files(&mut matched, options.sort_by, options.sort_order);
    let files = paginate(matched, options.offset, options.limit);

    info!(
        raw_total,
        filtered_total,
        returned = files.len(),
        "Scan complete"
    );

    Ok(ScanPage {
        files,
        raw_total,
        filtered_total,
    })
}

/// Regular files that are not hidden and not curator bookkeeping.
fn walk_visible(repo: &Repository, options: &ScanOptions) -> Result<Vec<FileDescriptor>> {
    let include_hidden = options.include_hidden || repo.config().include_hidden;
    let root = repo.root().to_path_buf();
    let trash_root = repo.trash_root();

    let walker = WalkBuilder::new(&root)
        .hidden(!include_hidden)
        .follow_links(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .max_depth(if options.recursive { None } else { Some(1) })
        .filter_entry(move |entry| entry.path() != trash_root.as_path())
        .build();

    let mut files = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().map_or(false, |ft| ft.is_file()) {
            continue;
        }
        let Some(rel) = repo.relative(entry.path()) else {
            continue;
        };
        if repo.is_internal(&rel) {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                debug!(path = %rel, error = %err, "Skipping file that vanished during scan");
                continue;
            }
        };
        files.push(FileDescriptor {
            path: rel,
            size: metadata.len(),
            modified: metadata.modified().ok(),
            status: None,
            tags: Vec::new(),
        });
    }
    Ok(files)
}

/// Whether an entry is a terminal, unexpired decision.
pub fn is_suppressed(
    repo: &Repository,
    entry: &FileEntry,
    options: &ScanOptions,
    now: DateTime<FixedOffset>,
) -> bool {
    match entry.status {
        Status::DecideLater => false,
        Status::KeepForever => true,
        Status::Keep => !(entry.is_expired(now) && options.include_expired),
        Status::Deleted => match &entry.delete_context {
            Some(ctx) => !repo.absolute(&ctx.original_path).exists(),
            None => false,
        },
        Status::Renamed => match &entry.renamed_from {
            Some(original) => !repo.absolute(original).exists(),
            None => true,
        },
    }
}

fn matches_term(file: &FileDescriptor, term: &str) -> bool {
    file.path.to_lowercase().contains(term)
        || file.tags.iter().any(|tag| tag.to_lowercase().contains(term))
}

/// Deterministic ordering: ties always break on the full path.
pub fn sort_files(files: &mut [FileDescriptor], key: SortKey, order: SortOrder) {
    files.sort_by(|a, b| {
        let primary = match key {
            SortKey::Name => a.path.to_lowercase().cmp(&b.path.to_lowercase()),
            SortKey::Size => a.size.cmp(&b.size),
            SortKey::Date => a.modified.cmp(&b.modified),
        };
        let ordering = primary.then_with(|| a.path.cmp(&b.path));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// Slice `[offset, offset + limit)`; out-of-range offsets give an empty page.
pub fn paginate<T>(items: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    let take = limit.unwrap_or(usize::MAX);
    items.into_iter().skip(offset).take(take).collect()
}
