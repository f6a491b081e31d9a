//! # lms-state — License Lifecycle State Machine
//!
//! Implements the license domain model and its state machines.
//!
//! ## Modules
//!
//! - **License** (`license.rs`): the license value object — commercial
//!   attributes, temporal attributes, lifecycle bookkeeping, external
//!   linkage — plus the status transition machine:
//!   `draft → active → expiring → expired` with `revoked` (terminal),
//!   `cancel` (recoverable), and `pending` branches. Transitions are
//!   checked against a transition table first, then against per-target
//!   semantic rules. Revoke/cancel return structured warnings alongside
//!   success instead of burying them in a log.
//!
//! - **Assignment** (`assignment.rs`): one license↔user seat grant.
//!   Revocation is terminal per row; a re-grant is a new row. The seat
//!   count on the license is derived from these rows, never written
//!   directly.
//!
//! - **Validation** (`validation.rs`): pure validation producing either
//!   an entity or a list of [`lms_core::ValidationIssue`]s — no
//!   throw-on-construct. A lenient mode substitutes sentinels for
//!   missing mandatory fields so one bad provider record cannot abort a
//!   reconciliation run.
//!
//! ## Design
//!
//! The machine is a dynamic transition table ([`LicenseStatus::valid_targets`])
//! rather than typestate: the table has cycles (`cancel → active`,
//! `expired → active`) and every caller — HTTP edits, the reconciliation
//! engine, the policy engine — selects targets from data at runtime.

pub mod assignment;
pub mod license;
pub mod validation;

// ─── License re-exports ─────────────────────────────────────────────

pub use license::{
    License, LicenseStatus, RenewalEntry, TransitionContext, TransitionOutcome,
    TransitionWarning,
};

// ─── Assignment re-exports ──────────────────────────────────────────

pub use assignment::{Assignment, AssignmentStatus};

// ─── Validation re-exports ──────────────────────────────────────────

pub use validation::{generate_license_key, LicenseDraft, ValidationMode, SYNC_PLACEHOLDER};
