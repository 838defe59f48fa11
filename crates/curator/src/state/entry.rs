//! File entries and curation statuses.

use crate::error::{CuratorError, Result};
use chrono::{DateTime, Duration, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Legacy spelling of a 90-day keep.
pub const LEGACY_KEEP_90_DAYS: &str = "keep_90_days";

/// Curation status of a tracked file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    DecideLater,
    #[serde(alias = "keep_90_days")]
    Keep,
    KeepForever,
    Deleted,
    Renamed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::DecideLater => "decide_later",
            Status::Keep => "keep",
            Status::KeepForever => "keep_forever",
            Status::Deleted => "deleted",
            Status::Renamed => "renamed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CuratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "decide_later" => Ok(Status::DecideLater),
            "keep" | LEGACY_KEEP_90_DAYS => Ok(Status::Keep),
            "keep_forever" => Ok(Status::KeepForever),
            "deleted" => Ok(Status::Deleted),
            "renamed" => Ok(Status::Renamed),
            other => Err(CuratorError::validation(format!("Unknown status '{}'", other))),
        }
    }
}

/// A decision a user can record directly.
///
/// `deleted` and `renamed` are only ever set by file operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    DecideLater,
    Keep { days: u32 },
    KeepForever,
}

impl Decision {
    /// Parse a status name plus an optional `--days` value.
    pub fn parse(status: &str, days: Option<i64>) -> Result<Self> {
        match status.trim() {
            "decide_later" => Ok(Decision::DecideLater),
            "keep_forever" => Ok(Decision::KeepForever),
            LEGACY_KEEP_90_DAYS => Ok(Decision::Keep { days: 90 }),
            "keep" => match days {
                Some(days) if days > 0 => Ok(Decision::Keep {
                    days: u32::try_from(days).map_err(|_| {
                        CuratorError::validation(format!("--days is too large: {}", days))
                    })?,
                }),
                _ => Err(CuratorError::validation(
                    "Status 'keep' requires --days greater than 0",
                )),
            },
            other => Err(CuratorError::validation(format!(
                "Invalid status '{}'. Allowed: decide_later, keep, keep_forever",
                other
            ))),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Decision::DecideLater => Status::DecideLater,
            Decision::Keep { .. } => Status::Keep,
            Decision::KeepForever => Status::KeepForever,
        }
    }

    pub fn keep_days(&self) -> Option<u32> {
        match self {
            Decision::Keep { days } => Some(*days),
            _ => None,
        }
    }
}

/// Where a deleted file went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteContext {
    pub original_path: String,
    pub trash_path: String,
    #[serde(default, with = "timestamp::option")]
    pub deleted_at: Option<DateTime<FixedOffset>>,
}

/// Persisted record for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub status: Status,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default, with = "timestamp::option")]
    pub last_updated: Option<DateTime<FixedOffset>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_days: Option<u32>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::option"
    )]
    pub expiry_date: Option<DateTime<FixedOffset>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_context: Option<DeleteContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<String>,

    /// Fields written by newer versions, carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl FileEntry {
    pub fn new(status: Status, now: DateTime<FixedOffset>) -> Self {
        Self {
            status,
            tags: BTreeSet::new(),
            last_updated: Some(now),
            keep_days: None,
            expiry_date: None,
            delete_context: None,
            renamed_from: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn touch(&mut self, now: DateTime<FixedOffset>) {
        self.last_updated = Some(now);
    }

    /// Record a user decision.
    pub fn apply_decision(&mut self, decision: Decision, now: DateTime<FixedOffset>) {
        self.status = decision.status();
        self.delete_context = None;
        match decision.keep_days() {
            Some(days) => {
                self.keep_days = Some(days);
                self.expiry_date = Some(now + Duration::days(i64::from(days)));
            }
            None => {
                self.keep_days = None;
                self.expiry_date = None;
            }
        }
        self.touch(now);
    }

    pub fn mark_deleted(&mut self, context: DeleteContext, now: DateTime<FixedOffset>) {
        self.status = Status::Deleted;
        self.keep_days = None;
        self.expiry_date = None;
        self.delete_context = Some(context);
        self.touch(now);
    }

    /// Expiry of a `keep` entry, stored or derived from `keep_days`.
    pub fn expiry(&self) -> Option<DateTime<FixedOffset>> {
        if self.status != Status::Keep {
            return None;
        }
        self.expiry_date.or_else(|| {
            let days = self.keep_days?;
            Some(self.last_updated? + Duration::days(i64::from(days)))
        })
    }

    pub fn is_expired(&self, now: DateTime<FixedOffset>) -> bool {
        self.expiry().map_or(false, |expiry| expiry <= now)
    }
}

/// Current local time with whole-second precision.
pub fn now_local() -> DateTime<FixedOffset> {
    timestamp::truncate(DateTime::<FixedOffset>::from(Local::now()))
}

pub mod timestamp {
    //! RFC 3339 timestamps, tolerant of the naive local timestamps older
    //! state files contain.

    use chrono::{
        DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Timelike,
    };

    pub fn format(ts: &DateTime<FixedOffset>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }

    pub fn truncate(ts: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        ts.with_nanosecond(0).unwrap_or(ts)
    }

    pub fn parse(raw: &str) -> Option<DateTime<FixedOffset>> {
        let raw = raw.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts);
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(DateTime::<FixedOffset>::from)
    }

    pub mod option {
        use chrono::{DateTime, FixedOffset};
        use serde::{Deserialize, Deserializer, Serializer};
        use serde_json::Value;

        pub fn serialize<S>(
            value: &Option<DateTime<FixedOffset>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(ts) => serializer.serialize_str(&super::format(ts)),
                None => serializer.serialize_none(),
            }
        }

        /// Unparseable values read as `None` instead of failing the entry.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = Option::<Value>::deserialize(deserializer)?;
            Ok(match value {
                Some(Value::String(raw)) => super::parse(&raw),
                _ => None,
            })
        }
    }
}
