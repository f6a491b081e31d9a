//! Wire types for the provider feed.
//!
//! The feed is inconsistent on purpose-defeating levels: numeric fields
//! arrive as numbers or as strings, absent values arrive as `null`,
//! `""`, or literal `"null"`, and free-text fields sometimes carry
//! malformed JSON fragments. These types only get the bytes off the
//! wire — every field that can be dirty is an `Option` or a raw
//! `serde_json::Value`, and interpretation is left to the
//! reconciliation engine's sanitizer.
//!
//! `serde(deny_unknown_fields)` is intentionally NOT used; the feed
//! grows fields without notice.

use serde::{Deserialize, Serialize};

/// One raw record from the provider feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecord {
    /// Stable external identifier; the only field the feed guarantees.
    pub id: String,
    #[serde(default)]
    pub countid: Option<String>,
    #[serde(default)]
    pub appid: Option<String>,
    #[serde(default)]
    pub license_type: Option<String>,
    #[serde(default)]
    pub dba: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub mid: Option<String>,
    /// Numeric status code; meaning is provider-internal.
    #[serde(default)]
    pub status: Option<i64>,
    /// Activation date as raw text; format varies by record age.
    #[serde(default)]
    pub activate_date: Option<String>,
    /// Arrives as a bool, a 0/1 number, or a string.
    #[serde(default)]
    pub coming_expired: Option<serde_json::Value>,
    /// Arrives as a number or a numeric string.
    #[serde(default)]
    pub monthly_fee: Option<serde_json::Value>,
    /// Arrives as a number or a numeric string.
    #[serde(default)]
    pub sms_balance: Option<serde_json::Value>,
    #[serde(default)]
    pub email_license: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub sendbat_workspace: Option<String>,
    #[serde(default)]
    pub last_active: Option<String>,
}

/// One page of the provider feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPage {
    /// Records on this page.
    #[serde(default)]
    pub records: Vec<ProviderRecord>,
    /// Zero-based page index.
    #[serde(default)]
    pub page: u32,
    /// Total pages available, when the provider reports it.
    #[serde(default)]
    pub total_pages: Option<u32>,
}
