//! License query filters.
//!
//! One filter type shared by the in-memory store and the Postgres layer
//! so list/count semantics cannot diverge between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lms_state::{License, LicenseStatus};

/// Filter for license list/count/bulk operations. All clauses are
/// conjunctive; an empty filter matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LicenseFilter {
    /// Match this lifecycle status.
    pub status: Option<LicenseStatus>,
    /// Match this product.
    pub product: Option<String>,
    /// Match this plan.
    pub plan: Option<String>,
    /// Match licenses expiring strictly within this many days.
    pub expiring_within_days: Option<i64>,
    /// Case-insensitive substring match over key, dba, and licensed
    /// email.
    pub search: Option<String>,
}

impl LicenseFilter {
    /// Whether a license matches every clause of this filter.
    pub fn matches(&self, license: &License, now: DateTime<Utc>) -> bool {
        if let Some(status) = self.status {
            if license.status != status {
                return false;
            }
        }
        if let Some(product) = &self.product {
            if &license.product != product {
                return false;
            }
        }
        if let Some(plan) = &self.plan {
            if &license.plan != plan {
                return false;
            }
        }
        if let Some(days) = self.expiring_within_days {
            if !license.is_expiring_soon(now, days) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = license.key.to_lowercase().contains(&needle)
                || license.dba.to_lowercase().contains(&needle)
                || license
                    .email_license
                    .as_deref()
                    .is_some_and(|e| e.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lms_state::License;

    fn at(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 0, 0, 0).unwrap()
    }

    fn sample() -> License {
        let mut lic = License::new("LIC-AAA", "Acme Corp", "messaging", "pro");
        lic.email_license = Some("ops@acme.example".into());
        lic.expires_at = Some(at(2026, 6, 20));
        lic
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(LicenseFilter::default().matches(&sample(), at(2026, 6, 1)));
    }

    #[test]
    fn status_and_product_clauses_are_conjunctive() {
        let filter = LicenseFilter {
            status: Some(LicenseStatus::Draft),
            product: Some("messaging".into()),
            ..LicenseFilter::default()
        };
        assert!(filter.matches(&sample(), at(2026, 6, 1)));

        let filter = LicenseFilter {
            status: Some(LicenseStatus::Active),
            product: Some("messaging".into()),
            ..LicenseFilter::default()
        };
        assert!(!filter.matches(&sample(), at(2026, 6, 1)));
    }

    #[test]
    fn expiring_within_uses_day_window() {
        let filter = LicenseFilter {
            expiring_within_days: Some(30),
            ..LicenseFilter::default()
        };
        assert!(filter.matches(&sample(), at(2026, 6, 1)));
        assert!(!filter.matches(&sample(), at(2026, 4, 1)));
    }

    #[test]
    fn search_is_case_insensitive_over_key_dba_email() {
        let mk = |s: &str| LicenseFilter {
            search: Some(s.into()),
            ..LicenseFilter::default()
        };
        let now = at(2026, 6, 1);
        assert!(mk("lic-aaa").matches(&sample(), now));
        assert!(mk("ACME").matches(&sample(), now));
        assert!(mk("ops@").matches(&sample(), now));
        assert!(!mk("zebra").matches(&sample(), now));
    }
}
