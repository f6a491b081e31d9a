//! # Error Hierarchy
//!
//! Structured error types for the entire License Management Stack, built
//! with `thiserror`. No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! The taxonomy distinguishes five failure classes:
//!
//! - [`ValidationFailure`] — malformed create/update input; fails only
//!   that operation.
//! - [`RuleViolation`] — an operation that is legal to request but
//!   illegal to perform (bad transition, duplicate assignment, seat
//!   exhaustion); fails only that operation.
//! - `DataIntegrity` — a storage-boundary constraint violation; surfaced,
//!   never retried.
//! - [`SyncFailure`] — a per-record reconciliation failure; isolated so
//!   the batch continues, error text persisted for later inspection.
//! - [`TransientError`] — timeout or connection loss; retried with
//!   bounded backoff at the batch level, never inside a single record's
//!   merge.
//!
//! User-facing errors carry a stable machine-readable code via `code()`.

use thiserror::Error;

use crate::identity::{LicenseId, UserId};

/// Top-level error type for the License Management Stack.
#[derive(Error, Debug)]
pub enum LmsError {
    /// Malformed create/update input.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    /// Business-rule violation.
    #[error("business rule violation: {0}")]
    Rule(#[from] RuleViolation),

    /// Storage-boundary constraint violation.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// The referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Per-record reconciliation failure.
    #[error("external sync error: {0}")]
    Sync(#[from] SyncFailure),

    /// Timeout or connection loss.
    #[error("transient infrastructure error: {0}")]
    Transient(#[from] TransientError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single field-level validation problem.
///
/// Validation is a pure function returning a list of issues, not a
/// throw-on-construct entity — the lenient reconciliation path reuses the
/// same shape with sentinel substitution instead of duplicating it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationIssue {
    /// The offending field, e.g. `"seats_total"`.
    pub field: String,
    /// Stable machine-readable code, e.g. `"REQUIRED"`, `"OUT_OF_RANGE"`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationIssue {
    /// Build an issue for a field with a stable code and message.
    pub fn new(field: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.field, self.code, self.message)
    }
}

/// A malformed create or update, carrying every field-level issue found.
#[derive(Error, Debug, Clone)]
#[error("{}", issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; "))]
pub struct ValidationFailure {
    /// All issues found by the validation pass.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationFailure {
    /// Stable machine-readable code for the failure class.
    pub fn code(&self) -> &'static str {
        "VALIDATION_ERROR"
    }
}

impl From<Vec<ValidationIssue>> for ValidationFailure {
    fn from(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }
}

/// An operation that is legal to request but illegal to perform.
///
/// State names are carried as strings so this crate does not depend on
/// the state-machine crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleViolation {
    /// The requested status transition is not in the transition table.
    #[error("invalid license transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status name.
        from: String,
        /// Requested target status name.
        to: String,
    },

    /// The license is in a terminal status; no transition is possible.
    #[error("license {license} is in terminal status {status}")]
    TerminalStatus {
        /// The license in question.
        license: LicenseId,
        /// The terminal status name.
        status: String,
    },

    /// Activation or expiry requires an expiry date that is not set.
    #[error("transition to {target} requires expires_at to be set")]
    MissingExpiry {
        /// The requested target status name.
        target: String,
    },

    /// Activating an already-expired license without renewal or force.
    #[error("license {license} is expired; activation requires renewal or force")]
    ExpiredActivation {
        /// The license in question.
        license: LicenseId,
    },

    /// The user already holds a non-revoked assignment on this license.
    #[error("user {user} already holds an active assignment on license {license}")]
    DuplicateAssignment {
        /// The license in question.
        license: LicenseId,
        /// The user already holding a seat.
        user: UserId,
    },

    /// All seats on the license are taken.
    #[error("license {license} has no available seats ({seats_total} total)")]
    SeatLimitReached {
        /// The license in question.
        license: LicenseId,
        /// The seat capacity.
        seats_total: u32,
    },

    /// The license is not assignable (not active, or already expired).
    #[error("license {license} is not assignable: {reason}")]
    NotAssignable {
        /// The license in question.
        license: LicenseId,
        /// Why assignment is refused.
        reason: String,
    },

    /// Deletion requested while active assignments remain.
    #[error("license {license} still has {count} active assignment(s)")]
    ActiveAssignmentsPresent {
        /// The license in question.
        license: LicenseId,
        /// Number of non-revoked assignments.
        count: usize,
    },
}

impl RuleViolation {
    /// Stable machine-readable code for user-facing surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::TerminalStatus { .. } => "TERMINAL_STATUS",
            Self::MissingExpiry { .. } => "MISSING_EXPIRY",
            Self::ExpiredActivation { .. } => "EXPIRED_ACTIVATION",
            Self::DuplicateAssignment { .. } => "DUPLICATE_ASSIGNMENT",
            Self::SeatLimitReached { .. } => "SEAT_LIMIT_REACHED",
            Self::NotAssignable { .. } => "NOT_ASSIGNABLE",
            Self::ActiveAssignmentsPresent { .. } => "ACTIVE_ASSIGNMENTS_PRESENT",
        }
    }
}

/// A per-record reconciliation failure.
///
/// One bad provider record never aborts the batch: the failure is captured
/// here, persisted on the record's snapshot, and the run continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("sync failed for external record {external_id}: {message}")]
pub struct SyncFailure {
    /// The stable external identifier of the failing record.
    pub external_id: String,
    /// Captured error text, persisted for later inspection.
    pub message: String,
}

impl SyncFailure {
    /// Build a sync failure for an external record.
    pub fn new(external_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            message: message.into(),
        }
    }
}

/// A timeout or connection-level failure.
///
/// Retried with bounded backoff at the batch level; never raised to a
/// human from system-initiated operations.
#[derive(Error, Debug, Clone)]
#[error("{operation} failed after {attempts} attempt(s): {message}")]
pub struct TransientError {
    /// The operation that failed, e.g. `"provider fetch page 3"`.
    pub operation: String,
    /// How many attempts were made before giving up.
    pub attempts: u32,
    /// The last underlying error text.
    pub message: String,
}
