//! # lms-provider — typed client for the external licensing provider
//!
//! The provider exposes a paginated, read-only feed of license records.
//! This crate is the only path the stack uses to reach it: it owns the
//! HTTP client, the bearer-token configuration, bounded retry for
//! transient failures, and the deliberately lenient wire types that
//! absorb the feed's inconsistencies (numbers as strings, empty strings
//! for absent values, malformed JSON fragments in text fields).
//!
//! Nothing here interprets the records — sanitization and merging live
//! in the reconciliation engine. The client's contract is only "fetch
//! the page, or say precisely why not."

pub mod client;
pub mod config;
pub mod error;
pub(crate) mod retry;
pub mod types;

pub use client::ProviderClient;
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use types::{ProviderPage, ProviderRecord};
