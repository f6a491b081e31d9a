//! # Assignment Ledger Rows
//!
//! One row links one license to one user. A row's lifecycle is one-way:
//! once revoked (or released) it never becomes active again — a re-grant
//! creates a new row. The invariant "at most one non-revoked assignment
//! per (license, user)" and the derived seat count are enforced by the
//! repository, which owns the full ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lms_core::{AssignmentId, LicenseId, RuleViolation, UserId};

/// The status of an assignment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    /// The user holds the seat.
    Assigned,
    /// The seat was released voluntarily.
    Unassigned,
    /// The seat was revoked by an administrator (terminal for the row).
    Revoked,
}

impl AssignmentStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Unassigned => "unassigned",
            Self::Revoked => "revoked",
        }
    }

    /// Convert a canonical status name to an `AssignmentStatus`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "assigned" => Some(Self::Assigned),
            "unassigned" => Some(Self::Unassigned),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One license↔user seat grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// Unique row identifier.
    pub id: AssignmentId,
    /// The license whose seat is granted.
    pub license_id: LicenseId,
    /// The user holding the seat.
    pub user_id: UserId,
    /// Row status.
    pub status: AssignmentStatus,
    /// When the seat was granted.
    pub assigned_at: DateTime<Utc>,
    /// When the seat was revoked. Required when `status` is `Revoked`;
    /// always after `assigned_at`.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Assignment {
    /// Grant a seat on `license_id` to `user_id`.
    pub fn new(license_id: LicenseId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: AssignmentId::new(),
            license_id,
            user_id,
            status: AssignmentStatus::Assigned,
            assigned_at: now,
            revoked_at: None,
        }
    }

    /// Whether this row currently occupies a seat.
    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Assigned
    }

    /// Whether this row counts against the duplicate guard.
    pub fn is_non_revoked(&self) -> bool {
        self.status != AssignmentStatus::Revoked
    }

    /// Revoke the seat. Terminal for this row.
    pub fn revoke(&mut self, now: DateTime<Utc>) -> Result<(), RuleViolation> {
        self.close(AssignmentStatus::Revoked, now)
    }

    /// Release the seat voluntarily. Terminal for this row.
    pub fn unassign(&mut self, now: DateTime<Utc>) -> Result<(), RuleViolation> {
        self.close(AssignmentStatus::Unassigned, now)
    }

    fn close(&mut self, to: AssignmentStatus, now: DateTime<Utc>) -> Result<(), RuleViolation> {
        if self.status != AssignmentStatus::Assigned {
            return Err(RuleViolation::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        // revoked_at must postdate the grant.
        let at = now.max(self.assigned_at);
        self.status = to;
        self.revoked_at = Some(at);
        Ok(())
    }
}
