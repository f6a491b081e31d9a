#![deny(missing_docs)]

//! # lms-core — Foundational Types for the License Management Stack
//!
//! This crate defines the types that every other crate in the workspace
//! depends on. It has no internal crate dependencies — only `serde`,
//! `serde_json`, `thiserror`, `chrono`, and `uuid` from the external
//! ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** Every identifier is a
//!    distinct type. You cannot pass a [`UserId`] where a [`LicenseId`]
//!    is expected.
//!
//! 2. **One error taxonomy.** Validation failures, business-rule
//!    violations, integrity errors, per-record sync failures, and
//!    transient infrastructure failures are distinct types with stable
//!    machine-readable codes. No `Box<dyn Error>`, no `.unwrap()`
//!    outside tests.
//!
//! 3. **UTC everywhere.** All timestamps are `chrono::DateTime<Utc>`;
//!    day arithmetic lives in [`temporal`] so reminder-window and
//!    grace-period math cannot diverge between crates.

pub mod error;
pub mod identity;
pub mod reminder;
pub mod sync;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{
    LmsError, RuleViolation, SyncFailure, TransientError, ValidationFailure, ValidationIssue,
};
pub use identity::{AssignmentId, EventId, LicenseId, SnapshotId, UserId};
pub use reminder::ReminderWindow;
pub use sync::SyncStatus;
pub use temporal::{days_until, same_calendar_day};
