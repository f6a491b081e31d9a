//! # Temporal Helpers — UTC Day Arithmetic
//!
//! All timestamps in the stack are `chrono::DateTime<Utc>`. The helpers
//! here centralize the day arithmetic used by expiry predicates, reminder
//! windows, and grace-period math so it cannot diverge between crates.
//!
//! `days_until` counts whole days by calendar date, not by elapsed
//! 24-hour periods: a license expiring at 23:59 tomorrow is 1 day out
//! regardless of the current time of day.

use chrono::{DateTime, Utc};

/// Whole days from `now` until `target`, by calendar date.
///
/// Negative when `target` is in the past.
pub fn days_until(target: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    target.date_naive().signed_duration_since(now.date_naive()).num_days()
}

/// Whether two instants fall on the same UTC calendar day.
///
/// Used by the merge policy to detect stale "defaulted to today" dates
/// left behind by a previously failed merge.
pub fn same_calendar_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}
