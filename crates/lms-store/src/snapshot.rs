//! Staged provider snapshots.
//!
//! Raw provider records are staged here, keyed by their stable external
//! identifier, with an independent lifecycle from licenses. Each
//! snapshot tracks its own sync outcome so one failing record never
//! touches the others.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lms_core::{SnapshotId, SyncStatus};

/// One staged provider record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLicenseSnapshot {
    /// Unique internal identifier.
    pub id: SnapshotId,
    /// Stable external identifier (appid, falling back to countid or
    /// email).
    pub external_id: String,
    /// The raw provider payload as received.
    pub payload: serde_json::Value,
    /// Outcome of the most recent reconciliation attempt.
    pub sync_status: SyncStatus,
    /// Captured error from the last failed attempt.
    pub sync_error: Option<String>,
    /// When the payload was last fetched from the provider.
    pub fetched_at: DateTime<Utc>,
    /// When the record was last successfully merged.
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl ExternalLicenseSnapshot {
    /// Stage a freshly fetched payload.
    pub fn new(external_id: impl Into<String>, payload: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id: SnapshotId::new(),
            external_id: external_id.into(),
            payload,
            sync_status: SyncStatus::Pending,
            sync_error: None,
            fetched_at: now,
            last_synced_at: None,
        }
    }

    /// Mark the snapshot as merged.
    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.sync_status = SyncStatus::Synced;
        self.sync_error = None;
        self.last_synced_at = Some(now);
    }

    /// Mark the snapshot as failed, capturing the error text.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.sync_status = SyncStatus::Failed;
        self.sync_error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lifecycle_marks() {
        let now = Utc::now();
        let mut snap = ExternalLicenseSnapshot::new("app-1", json!({"appid": "app-1"}), now);
        assert_eq!(snap.sync_status, SyncStatus::Pending);

        snap.mark_failed("bad status field");
        assert_eq!(snap.sync_status, SyncStatus::Failed);
        assert_eq!(snap.sync_error.as_deref(), Some("bad status field"));

        snap.mark_synced(now);
        assert_eq!(snap.sync_status, SyncStatus::Synced);
        assert!(snap.sync_error.is_none());
        assert_eq!(snap.last_synced_at, Some(now));
    }
}
