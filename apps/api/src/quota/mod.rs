//! Quota Gate: per-user rolling-window allowance for analysis triggers.
//!
//! A usage record moves through four states: no record, window expired,
//! under limit and at limit. `PgStore::consume` performs the transition as
//! one conditional upsert. [`apply`] is the same machine in plain Rust; the
//! in-memory store runs it and the Postgres tests compare against it.

mod middleware;

pub use middleware::enforce;

use std::time::Duration;

use chrono::{DateTime, Utc};
#[cfg(test)]
use uuid::Uuid;

#[cfg(test)]
use crate::models::usage::UsageRecord;

#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    /// Allowance written into new usage records.
    pub max_daily: i32,
    pub window: Duration,
    /// Callers with this role are never counted.
    pub privileged_role: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuotaDecision {
    Allowed { count: i32 },
    Exceeded { remaining: Duration },
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageState {
    NoRecord,
    WindowExpired,
    UnderLimit,
    AtLimit,
}

#[cfg(test)]
pub fn classify(record: Option<&UsageRecord>, window: Duration, now: DateTime<Utc>) -> UsageState {
    let Some(record) = record else {
        return UsageState::NoRecord;
    };
    if now - record.last_used_at >= window_delta(window) {
        UsageState::WindowExpired
    } else if record.count < record.max_daily {
        UsageState::UnderLimit
    } else {
        UsageState::AtLimit
    }
}

/// Applies one gated request to `record`. Returns the record to persist and
/// the decision; a rejected request leaves the record untouched.
#[cfg(test)]
pub fn apply(
    record: Option<UsageRecord>,
    user_id: Uuid,
    policy: &QuotaPolicy,
    now: DateTime<Utc>,
) -> (Option<UsageRecord>, QuotaDecision) {
    match (classify(record.as_ref(), policy.window, now), record) {
        (UsageState::NoRecord, _) | (_, None) => {
            let created = UsageRecord {
                user_id,
                max_daily: policy.max_daily,
                count: 1,
                last_used_at: now,
            };
            (Some(created), QuotaDecision::Allowed { count: 1 })
        }
        (UsageState::WindowExpired, Some(mut r)) => {
            r.count = 1;
            r.last_used_at = now;
            (Some(r), QuotaDecision::Allowed { count: 1 })
        }
        (UsageState::UnderLimit, Some(mut r)) => {
            r.count += 1;
            r.last_used_at = now;
            let count = r.count;
            (Some(r), QuotaDecision::Allowed { count })
        }
        (UsageState::AtLimit, Some(r)) => {
            let remaining = remaining_in_window(r.last_used_at, policy.window, now);
            (Some(r), QuotaDecision::Exceeded { remaining })
        }
    }
}

/// Time until the window opened at `last_used_at` closes. Never zero, so
/// clients always get a positive wait hint.
pub fn remaining_in_window(
    last_used_at: DateTime<Utc>,
    window: Duration,
    now: DateTime<Utc>,
) -> Duration {
    let remaining = window_delta(window) - (now - last_used_at);
    let secs = remaining.num_seconds().max(1);
    Duration::from_secs(secs as u64)
}

fn window_delta(window: Duration) -> chrono::Duration {
    chrono::Duration::seconds(window.as_secs() as i64)
}
