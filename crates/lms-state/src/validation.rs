//! # Pure License Validation
//!
//! Validation is a function from draft input to either a [`License`] or
//! a list of [`ValidationIssue`]s — entities do not validate in their
//! constructors. The same shape serves two callers with different
//! tolerances:
//!
//! - **Strict** — manual creation via the admin surface. Missing
//!   mandatory fields (`dba`, `product`, `plan`) are hard failures.
//! - **Lenient** — the reconciliation path. Missing mandatory fields are
//!   substituted with a sentinel so one bad provider record cannot abort
//!   a run; everything else is validated identically.
//!
//! A reversed validity window (`starts_at > expires_at`) is corrected by
//! swapping the two dates in both modes, not rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lms_core::ValidationIssue;

use crate::license::License;

/// Sentinel substituted for mandatory fields the provider left blank.
pub const SYNC_PLACEHOLDER: &str = "pending-sync";

/// How strictly to treat missing mandatory fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Manual entry: mandatory fields are required.
    Strict,
    /// Reconciliation: mandatory fields fall back to a sentinel.
    Lenient,
}

/// Caller-supplied draft of a new license.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LicenseDraft {
    /// License key; generated when absent.
    pub key: Option<String>,
    /// Doing-business-as name. Mandatory for manual creation.
    pub dba: Option<String>,
    /// Product. Mandatory for manual creation.
    pub product: Option<String>,
    /// Plan. Mandatory for manual creation.
    pub plan: Option<String>,
    /// Billing term.
    pub term: Option<String>,
    /// Seat capacity; defaults to 1.
    pub seats_total: Option<u32>,
    /// Start of the validity window.
    pub starts_at: Option<DateTime<Utc>>,
    /// End of the validity window.
    pub expires_at: Option<DateTime<Utc>>,
    /// Grace period in days; defaults to 30.
    pub grace_period_days: Option<i64>,
    /// Whether auto-suspension is enabled; defaults to false.
    pub auto_suspend_enabled: Option<bool>,
    /// Licensed email address.
    pub email_license: Option<String>,
    /// Free-form note.
    pub note: Option<String>,
}

impl LicenseDraft {
    /// Validate the draft and build a [`License`].
    ///
    /// Returns every issue found, not just the first. A reversed
    /// validity window is swapped, never rejected.
    pub fn build(self, mode: ValidationMode) -> Result<License, Vec<ValidationIssue>> {
        let mut issues = Vec::new();

        let dba = mandatory("dba", self.dba, mode, &mut issues);
        let product = mandatory("product", self.product, mode, &mut issues);
        let plan = mandatory("plan", self.plan, mode, &mut issues);

        let seats_total = self.seats_total.unwrap_or(1);
        if seats_total == 0 {
            issues.push(ValidationIssue::new(
                "seats_total",
                "OUT_OF_RANGE",
                "seat capacity must be at least 1",
            ));
        }

        let grace_period_days = self.grace_period_days.unwrap_or(30);
        if grace_period_days < 0 {
            issues.push(ValidationIssue::new(
                "grace_period_days",
                "OUT_OF_RANGE",
                "grace period cannot be negative",
            ));
        }

        if let Some(email) = self.email_license.as_deref() {
            if !email.contains('@') {
                issues.push(ValidationIssue::new(
                    "email_license",
                    "MALFORMED",
                    format!("not an email address: {email:?}"),
                ));
            }
        }

        if !issues.is_empty() {
            return Err(issues);
        }

        // Reversed window: auto-correct by swapping.
        let (starts_at, expires_at) = match (self.starts_at, self.expires_at) {
            (Some(s), Some(e)) if s > e => (Some(e), Some(s)),
            other => other,
        };

        let mut license = License::new(
            self.key.unwrap_or_else(generate_license_key),
            dba,
            product,
            plan,
        );
        license.term = self.term;
        license.seats_total = seats_total;
        license.starts_at = starts_at;
        license.expires_at = expires_at;
        license.grace_period_days = grace_period_days;
        license.auto_suspend_enabled = self.auto_suspend_enabled.unwrap_or(false);
        license.email_license = self.email_license;
        license.note = self.note;
        Ok(license)
    }
}

/// Resolve a mandatory field per the validation mode.
fn mandatory(
    field: &str,
    value: Option<String>,
    mode: ValidationMode,
    issues: &mut Vec<ValidationIssue>,
) -> String {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(v) => v,
        None => match mode {
            ValidationMode::Strict => {
                issues.push(ValidationIssue::new(
                    field,
                    "REQUIRED",
                    format!("{field} is required"),
                ));
                String::new()
            }
            ValidationMode::Lenient => SYNC_PLACEHOLDER.to_string(),
        },
    }
}

/// Generate a unique license key, e.g. `LIC-6F9619FF8B86`.
pub fn generate_license_key() -> String {
    let id = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("LIC-{}", &id[..12])
}
