//! The per-repository state record and its schema migration.

use super::entry::{timestamp, FileEntry, LEGACY_KEEP_90_DAYS};
use crate::repo::normalize_stored_key;
use chrono::{DateTime, Duration, FixedOffset};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::collections::btree_map::{self, BTreeMap};
use tracing::{debug, warn};

/// Reserved key holding the schema version.
pub const SCHEMA_VERSION_KEY: &str = "_schema_version";

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u64 = 2;

/// All curation decisions for one repository, keyed by relative path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateRecord {
    /// Version the record was read at (or the current version for new records).
    pub schema_version: u64,
    entries: BTreeMap<String, FileEntry>,
    /// Reserved `_`-prefixed keys other than the schema version.
    reserved: BTreeMap<String, Value>,
    /// Entries this build cannot read, written back exactly as loaded.
    passthrough: BTreeMap<String, Value>,
}

impl StateRecord {
    pub fn new() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            entries: BTreeMap::new(),
            reserved: BTreeMap::new(),
            passthrough: BTreeMap::new(),
        }
    }

    /// Parse, migrate and type a state file's contents.
    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Object(map) = value else {
            return Err(serde::de::Error::custom("state root must be a JSON object"));
        };
        Ok(Self::from_migrated(migrate(map)))
    }

    fn from_migrated(map: Map<String, Value>) -> Self {
        let mut record = StateRecord {
            schema_version: read_version(&map),
            ..StateRecord::default()
        };
        for (key, value) in map {
            if key == SCHEMA_VERSION_KEY {
                continue;
            }
            if key.starts_with('_') && !value.is_object() {
                record.reserved.insert(key, value);
                continue;
            }
            if !value.is_object() {
                warn!(key = %key, "Dropping malformed state entry (not an object)");
                continue;
            }
            match serde_json::from_value::<FileEntry>(value.clone()) {
                Ok(entry) => {
                    record.entries.insert(key, entry);
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "Keeping unreadable state entry as-is");
                    record.passthrough.insert(key, value);
                }
            }
        }
        record
    }

    /// Pretty, deterministic JSON with a trailing newline.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    pub fn get(&self, key: &str) -> Option<&FileEntry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut FileEntry> {
        self.entries.get_mut(key)
    }

    /// Entry for `key`, created as `decide_later` if missing.
    pub fn entry_or_default(&mut self, key: &str, now: DateTime<FixedOffset>) -> &mut FileEntry {
        self.passthrough.remove(key);
        self.entries
            .entry(key.to_string())
            .or_insert_with(|| FileEntry::new(super::Status::DecideLater, now))
    }

    pub fn insert(&mut self, key: String, entry: FileEntry) -> Option<FileEntry> {
        self.passthrough.remove(&key);
        self.entries.insert(key, entry)
    }

    pub fn remove(&mut self, key: &str) -> Option<FileEntry> {
        self.passthrough.remove(key);
        self.entries.remove(key)
    }

    /// Raw value of an entry kept because it could not be read.
    pub fn unreadable(&self, key: &str) -> Option<&Value> {
        self.passthrough.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FileEntry> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for StateRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = 1 + self.reserved.len() + self.entries.len() + self.passthrough.len();
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(
            SCHEMA_VERSION_KEY,
            &self.schema_version.max(CURRENT_SCHEMA_VERSION),
        )?;
        for (key, value) in &self.reserved {
            map.serialize_entry(key, value)?;
        }

        // Both maps are sorted and disjoint; merge them so keys stay in order.
        let mut entries = self.entries.iter().peekable();
        let mut raw = self.passthrough.iter().peekable();
        loop {
            let take_entry = match (entries.peek(), raw.peek()) {
                (Some((a, _)), Some((b, _))) => a < b,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            if take_entry {
                if let Some((key, entry)) = entries.next() {
                    map.serialize_entry(key, entry)?;
                }
            } else if let Some((key, value)) = raw.next() {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

fn read_version(map: &Map<String, Value>) -> u64 {
    map.get(SCHEMA_VERSION_KEY)
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Bring a raw state object up to [`CURRENT_SCHEMA_VERSION`], one version at
/// a time. Newer versions pass through untouched.
pub fn migrate(mut map: Map<String, Value>) -> Map<String, Value> {
    let mut version = read_version(&map);
    while version < CURRENT_SCHEMA_VERSION {
        map = match version {
            0 => migrate_v0_to_v1(map),
            _ => migrate_v1_to_v2(map),
        };
        version += 1;
        debug!(version, "Migrated state record");
        map.insert(SCHEMA_VERSION_KEY.to_string(), Value::from(version));
    }
    map
}

fn is_entry_key(key: &str, value: &Value) -> bool {
    key != SCHEMA_VERSION_KEY && !(key.starts_with('_') && !value.is_object())
}

/// v0 -> v1: statuses, tags and keep expiry get their canonical shapes.
fn migrate_v0_to_v1(map: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in map {
        if !is_entry_key(&key, &value) {
            out.insert(key, value);
            continue;
        }
        let Value::Object(mut entry) = value else {
            warn!(key = %key, "Dropping malformed state entry (not an object)");
            continue;
        };

        let status = match entry.get("status").and_then(Value::as_str) {
            Some(LEGACY_KEEP_90_DAYS) => {
                entry
                    .entry("keep_days")
                    .or_insert_with(|| Value::from(90));
                "keep".to_string()
            }
            Some(s @ ("decide_later" | "keep" | "keep_forever" | "deleted" | "renamed")) => {
                s.to_string()
            }
            Some(other) => {
                warn!(key = %key, status = %other, "Unknown status, resetting to decide_later");
                "decide_later".to_string()
            }
            None => "decide_later".to_string(),
        };

        let tags = match entry.remove("tags") {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(tag)) if !tag.trim().is_empty() => vec![tag],
            _ => Vec::new(),
        };
        entry.insert("tags".to_string(), Value::from(tags));

        if status == "keep" {
            let days = entry.get("keep_days").and_then(Value::as_u64).filter(|d| *d > 0);
            match days {
                Some(days) => {
                    let has_expiry = entry
                        .get("expiry_date")
                        .and_then(Value::as_str)
                        .and_then(timestamp::parse)
                        .is_some();
                    if !has_expiry {
                        let derived = entry
                            .get("last_updated")
                            .and_then(Value::as_str)
                            .and_then(timestamp::parse)
                            .map(|updated| updated + Duration::days(days as i64));
                        if let Some(expiry) = derived {
                            entry.insert(
                                "expiry_date".to_string(),
                                Value::from(timestamp::format(&expiry)),
                            );
                        }
                    }
                }
                None => {
                    warn!(key = %key, "Keep entry without keep_days, resetting to decide_later");
                    entry.remove("keep_days");
                    entry.remove("expiry_date");
                    entry.insert("status".to_string(), Value::from("decide_later"));
                    out.insert(key, Value::Object(entry));
                    continue;
                }
            }
        }

        entry.insert("status".to_string(), Value::from(status));
        out.insert(key, Value::Object(entry));
    }
    out
}

/// v1 -> v2: keys become forward-slash relative paths; on collision the
/// most recently updated entry survives.
fn migrate_v1_to_v2(map: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    let mut entries: BTreeMap<String, Value> = BTreeMap::new();
    for (key, value) in map {
        if !is_entry_key(&key, &value) {
            out.insert(key, value);
            continue;
        }
        let Some(normalized) = normalize_stored_key(&key) else {
            warn!(key = %key, "Dropping state entry with a non-relative key");
            continue;
        };
        match entries.get(&normalized) {
            Some(existing) if last_updated(existing) >= last_updated(&value) => {
                warn!(key = %key, normalized = %normalized, "Duplicate key after normalization, keeping newer entry");
            }
            Some(_) => {
                warn!(key = %key, normalized = %normalized, "Duplicate key after normalization, keeping newer entry");
                entries.insert(normalized, value);
            }
            None => {
                entries.insert(normalized, value);
            }
        }
    }
    out.extend(entries);
    out
}

fn last_updated(value: &Value) -> Option<DateTime<FixedOffset>> {
    value
        .get("last_updated")
        .and_then(Value::as_str)
        .and_then(timestamp::parse)
}
