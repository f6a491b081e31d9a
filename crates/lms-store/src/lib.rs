//! # lms-store — Persistence Boundary
//!
//! The repository layer of the License Management Stack.
//!
//! ## Architecture
//!
//! [`LicenseStore`] is the authoritative in-memory repository: licenses,
//! the assignment ledger, the audit log, and staged provider snapshots
//! behind `parking_lot` locks. Every engine in the workspace — the
//! reconciliation engine, the policy engine, the admin surface — mutates
//! through it, and every invariant is enforced here:
//!
//! - `seats_used` is recomputed from the assignment ledger inside the
//!   same write-lock critical section as every assignment write. Two
//!   concurrent assignment requests on one license cannot both act on a
//!   stale count.
//! - The duplicate guard rejects a second non-revoked assignment for the
//!   same (license, user).
//! - Deletion is a guarded status transition, never a row removal.
//!
//! The [`pg`] module is the durable layer: plain functions over a
//! `sqlx::PgPool`, one file per table, mirroring the in-memory
//! operations. The batch binary loads rows into the store at startup and
//! writes changes back through `pg` after each mutation. Seat recounting
//! there runs inside a transaction with `SELECT … FOR UPDATE`, the
//! application-level equivalent of the storage-engine trigger it
//! replaces.
//!
//! ## Audit
//!
//! Every mutation appends exactly one [`audit::AuditEvent`]. Audit
//! failures are reported, never rolled back into the triggering
//! mutation.

pub mod audit;
pub mod memory;
pub mod pg;
pub mod query;
pub mod snapshot;

pub use audit::{AuditEvent, AuditLog, ChainIntegrity};
pub use memory::LicenseStore;
pub use query::LicenseFilter;
pub use snapshot::ExternalLicenseSnapshot;
