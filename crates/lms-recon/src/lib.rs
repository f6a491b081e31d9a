//! # lms-recon — external reconciliation engine
//!
//! Ingests the provider feed and merges it into the license store in
//! three stages:
//!
//! 1. **sanitize** — normalize the feed's junk encodings (`null`,
//!    `""`, `"null"`, empty arrays/objects, numbers-as-strings) into a
//!    canonical absent value, or reject a value that claims data but
//!    cannot be interpreted;
//! 2. **identify** — resolve each record to an internal license by
//!    `appid`, then `countid`, then licensed email; unmatched records
//!    create a new license rather than being dropped;
//! 3. **merge** — apply a per-field overwrite policy as an explicit
//!    changeset, so an unchanged replay produces zero writes.
//!
//! One bad record never aborts a run: its failure is captured on the
//! record's snapshot and the batch continues. A run guard prevents two
//! concurrent runs over the same store.

pub mod engine;
pub mod identify;
pub mod merge;
pub mod sanitize;

pub use engine::{ReconEngine, ReconError, ReconReport};
pub use identify::MatchOutcome;
pub use merge::{Changeset, FieldChange};
pub use sanitize::CleanRecord;
