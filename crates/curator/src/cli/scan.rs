//! `scan` and `sort`: list files that still need a decision.

use crate::cli::output::{color_for_status, format_size, format_time, print_table_colored, OutputMode};
use clap::Args;
use curator::scan::{scan, ScanOptions, ScanPage, SortKey, SortOrder};
use curator::Repository;
use serde::Serialize;

/// Listing options shared by `scan`, `sort` and `rules`.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Descend into subdirectories
    #[arg(short = 'r', long)]
    pub recursive: bool,

    /// Glob to include (repeatable)
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Glob to exclude (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Include dotfiles and dot-directories
    #[arg(long)]
    pub hidden: bool,

    /// Relist files whose temporary keep has expired
    #[arg(long)]
    pub include_expired: bool,
}

impl ListArgs {
    pub fn to_options(&self) -> ScanOptions {
        ScanOptions {
            recursive: self.recursive,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            include_hidden: self.hidden,
            include_expired: self.include_expired,
            ..ScanOptions::default()
        }
    }
}

/// Paging shared by `scan` and `sort`.
#[derive(Args, Debug, Clone, Default)]
pub struct PageArgs {
    /// Maximum number of files to return (negative means no limit)
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Files to skip before the page starts (negative means 0)
    #[arg(long, allow_negative_numbers = true)]
    pub offset: Option<i64>,

    /// Case-insensitive search over path and tags
    #[arg(long)]
    pub filter: Option<String>,
}

impl PageArgs {
    fn offset(&self) -> usize {
        self.offset
            .and_then(|o| usize::try_from(o).ok())
            .unwrap_or(0)
    }

    fn limit(&self) -> Option<usize> {
        self.limit.and_then(|l| usize::try_from(l).ok())
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub list: ListArgs,

    #[command(flatten)]
    pub page: PageArgs,

    /// name, size or date
    #[arg(long, default_value = "name")]
    pub sort_by: String,

    /// asc or desc
    #[arg(long, default_value = "asc")]
    pub sort_order: String,
}

#[derive(Args, Debug, Clone)]
pub struct SortArgs {
    /// name, size or date
    pub sort_by: String,

    /// asc or desc
    #[arg(long, default_value = "asc")]
    pub order: String,

    #[command(flatten)]
    pub list: ListArgs,

    #[command(flatten)]
    pub page: PageArgs,
}

/// JSON document for `scan` and `sort`
#[derive(Debug, Serialize)]
struct ScanOutput {
    files: Vec<String>,
    count: usize,
    total: usize,
    filtered_total: usize,
    raw_total: usize,
    limit: Option<usize>,
    offset: usize,
    sort_by: SortKey,
    sort_order: SortOrder,
    recursive: bool,
    include_expired: bool,
}

pub fn run_scan(repo: &Repository, args: ScanArgs, out: OutputMode) -> anyhow::Result<u8> {
    let sort_by: SortKey = args.sort_by.parse()?;
    let sort_order: SortOrder = args.sort_order.parse()?;
    list(repo, &args.list, &args.page, sort_by, sort_order, out)
}

pub fn run_sort(repo: &Repository, args: SortArgs, out: OutputMode) -> anyhow::Result<u8> {
    let sort_by: SortKey = args.sort_by.parse()?;
    let sort_order: SortOrder = args.order.parse()?;
    if out.human() {
        println!("Sorting by {} in {} order.", sort_by, sort_order);
    }
    list(repo, &args.list, &args.page, sort_by, sort_order, out)
}

fn list(
    repo: &Repository,
    list: &ListArgs,
    page: &PageArgs,
    sort_by: SortKey,
    sort_order: SortOrder,
    out: OutputMode,
) -> anyhow::Result<u8> {
    let options = ScanOptions {
        filter: page.filter.clone(),
        sort_by,
        sort_order,
        offset: page.offset(),
        limit: page.limit(),
        ..list.to_options()
    };
    let result = scan(repo, &options)?;

    if out.json {
        let output = ScanOutput {
            files: result.files.iter().map(|f| f.path.clone()).collect(),
            count: result.files.len(),
            total: result.filtered_total,
            filtered_total: result.filtered_total,
            raw_total: result.raw_total,
            limit: options.limit,
            offset: options.offset,
            sort_by,
            sort_order,
            recursive: options.recursive,
            include_expired: options.include_expired,
        };
        crate::cli::output::print_json(&output)?;
    } else if out.quiet {
        for file in &result.files {
            println!("{}", file.path);
        }
    } else {
        print_human(&result, &options);
    }
    Ok(curator::error::exit_code::SUCCESS)
}

fn print_human(result: &ScanPage, options: &ScanOptions) {
    if result.files.is_empty() {
        if result.filtered_total > 0 {
            println!(
                "No files on this page (offset {} of {}).",
                options.offset, result.filtered_total
            );
        } else {
            println!("No files need review.");
        }
        return;
    }

    let rows = result
        .files
        .iter()
        .map(|file| {
            let status = file.status.map(|s| s.to_string()).unwrap_or_else(|| "new".to_string());
            vec![
                (file.path.clone(), None),
                (format_size(file.size), None),
                (file.modified.map(format_time).unwrap_or_else(|| "-".to_string()), None),
                (status, Some(color_for_status(file.status))),
                (file.tags.join(", "), None),
            ]
        })
        .collect();
    print_table_colored(&["FILE", "SIZE", "MODIFIED", "STATUS", "TAGS"], rows);

    let first = options.offset + 1;
    let last = options.offset + result.files.len();
    println!(
        "Showing {}-{} of {} files needing review ({} scanned).",
        first, last, result.filtered_total, result.raw_total
    );
}
