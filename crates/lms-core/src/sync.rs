//! # External Sync Status
//!
//! Per-record reconciliation outcome shared by licenses and staged
//! provider snapshots. One definition, exhaustive `match` everywhere —
//! no independent status lists that can diverge.

use serde::{Deserialize, Serialize};

/// Outcome of the most recent reconciliation attempt for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Never reconciled, or a new run is pending.
    Pending,
    /// The last reconciliation applied (or confirmed) this record.
    Synced,
    /// The last reconciliation failed for this record; see the captured
    /// error text.
    Failed,
}

impl SyncStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }

    /// Convert a canonical status name to a `SyncStatus`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pending" => Some(Self::Pending),
            "synced" => Some(Self::Synced),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_via_name() {
        for status in [SyncStatus::Pending, SyncStatus::Synced, SyncStatus::Failed] {
            assert_eq!(SyncStatus::from_name(status.as_str()), Some(status));
        }
        assert_eq!(SyncStatus::from_name("unknown"), None);
    }
}
