//! Human and JSON rendering shared by every command.
//!
//! JSON goes to stdout as a single line; human output is comfy-table tables
//! with status colours, sizes in binary units and relative times.

use chrono::{DateTime, Local};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use curator::Status;
use serde::Serialize;
use std::time::{Duration, SystemTime};

/// How a command should talk to the user.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputMode {
    pub json: bool,
    pub quiet: bool,
}

impl OutputMode {
    /// Human-readable output is wanted.
    pub fn human(&self) -> bool {
        !self.json && !self.quiet
    }

    /// Print `value` as JSON in `--json` mode, otherwise run `human`
    /// unless `--quiet` is set.
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce()) -> anyhow::Result<()> {
        if self.json {
            print_json(value)
        } else {
            if !self.quiet {
                human();
            }
            Ok(())
        }
    }
}

/// Print a JSON document on one line.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// Byte count in binary units with one decimal, e.g. `1536` is `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    let (unit, scale) = match bytes {
        b if b >= TB => ("TB", TB),
        b if b >= GB => ("GB", GB),
        b if b >= MB => ("MB", MB),
        b if b >= KB => ("KB", KB),
        _ => return format!("{} B", bytes),
    };
    format!("{:.1} {}", bytes as f64 / scale as f64, unit)
}

/// Relative time for the last week, an absolute date beyond that.
pub fn format_time(time: SystemTime) -> String {
    match SystemTime::now().duration_since(time) {
        Ok(duration) => format_duration_ago(duration, time),
        Err(_) => "just now".to_string(),
    }
}

fn plural(n: u64, unit: &str) -> String {
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

fn format_duration_ago(duration: Duration, time: SystemTime) -> String {
    let secs = duration.as_secs();
    match secs {
        0..=59 => plural(secs, "second"),
        60..=3599 => plural(secs / 60, "minute"),
        3600..=86_399 => plural(secs / 3600, "hour"),
        86_400..=604_799 => plural(secs / 86_400, "day"),
        _ => {
            let local: DateTime<Local> = time.into();
            local.format("%Y-%m-%d %H:%M").to_string()
        }
    }
}

pub fn color_for_status(status: Option<Status>) -> Color {
    match status {
        None => Color::White,
        Some(Status::DecideLater) => Color::Yellow,
        Some(Status::Keep) => Color::Green,
        Some(Status::KeepForever) => Color::DarkGreen,
        Some(Status::Deleted) => Color::Red,
        Some(Status::Renamed) => Color::Blue,
    }
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);
    table
}

/// Plain table, headers in cyan.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = new_table(headers);
    for row in rows {
        table.add_row(row);
    }
    println!("{}", table);
}

/// Print a table with per-cell colors
pub fn print_table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) {
    let mut table = new_table(headers);
    for row in rows {
        let cells: Vec<Cell> = row
            .into_iter()
            .map(|(text, color)| match color {
                Some(c) => Cell::new(text).fg(c),
                None => Cell::new(text),
            })
            .collect();
        table.add_row(cells);
    }
    println!("{}", table);
}
