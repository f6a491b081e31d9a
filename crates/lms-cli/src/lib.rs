//! # lms-cli — operational CLI for the License Management Stack
//!
//! Provides the `lms` command-line interface for the jobs an operator
//! runs against the store:
//!
//! - `lms sync` — run a reconciliation batch against the provider feed
//!   (or a local record file).
//! - `lms lifecycle` — run a lifecycle policy pass: reminders, expiry
//!   marking, auto-suspension.
//! - `lms audit verify` — verify the audit event hash chain.
//!
//! All subcommands load the Postgres tables into the in-memory store,
//! run the engines against it, and write the results back.

pub mod audit;
pub mod lifecycle;
pub mod persist;
pub mod sync;
