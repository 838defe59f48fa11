//! Time-boxed keeps that have run out.

use crate::error::Result;
use crate::repo::Repository;
use crate::state::{timestamp, Decision, StateRecord, Status};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiredDetail {
    pub filename: String,
    pub status: Status,
    pub keep_days: Option<u32>,
    pub expiry_date: Option<String>,
    pub expired: bool,
    pub days_overdue: i64,
}

/// Expired `keep` entries in key order.
pub fn expired_entries(record: &StateRecord, now: DateTime<FixedOffset>) -> Vec<ExpiredDetail> {
    record
        .iter()
        .filter(|(_, entry)| entry.is_expired(now))
        .map(|(key, entry)| {
            let expiry = entry.expiry();
            ExpiredDetail {
                filename: key.clone(),
                status: entry.status,
                keep_days: entry.keep_days,
                expiry_date: expiry.as_ref().map(timestamp::format),
                expired: true,
                days_overdue: expiry.map_or(0, |e| (now - e).num_days().max(0)),
            }
        })
        .collect()
}

/// Report expired entries without changing anything.
pub fn mark_expired(repo: &Repository, now: DateTime<FixedOffset>) -> Result<Vec<ExpiredDetail>> {
    let record = repo.store().read()?;
    Ok(expired_entries(&record, now))
}

/// Apply `transition` to every expired entry and return the keys updated.
///
/// Running it again right away finds nothing left to update.
pub fn resolve_expired(
    repo: &Repository,
    now: DateTime<FixedOffset>,
    transition: Decision,
) -> Result<Vec<String>> {
    repo.store().with_lock(|state| {
        let mut record = state.load()?;
        let keys: Vec<String> = expired_entries(&record, now)
            .into_iter()
            .map(|d| d.filename)
            .collect();
        if keys.is_empty() {
            return Ok(keys);
        }
        for key in &keys {
            if let Some(entry) = record.get_mut(key) {
                entry.apply_decision(transition, now);
            }
        }
        state.save(&record)?;
        info!(count = keys.len(), to = %transition.status(), "Resolved expired keeps");
        Ok(keys)
    })
}
