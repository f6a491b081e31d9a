//! Identifier resolution.
//!
//! A provider record is matched to an internal license by `appid`
//! first, then `countid`, then licensed email. The match tier is kept
//! on the outcome so the merge can be audited with how the link was
//! made. A record matching nothing is `Unmatched` — the engine creates
//! a new license for it rather than dropping it.

use lms_state::License;
use lms_store::LicenseStore;

use crate::sanitize::CleanRecord;

/// How a provider record resolved against the store.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// Matched an existing license.
    Matched {
        /// The matched license, as read at resolution time.
        license: Box<License>,
        /// Which identifier tier made the match.
        matched_by: MatchTier,
    },
    /// No identifier matched; a new license is needed.
    Unmatched,
}

/// The identifier tier that resolved a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Appid,
    Countid,
    Email,
}

impl MatchTier {
    /// Stable name for audit metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appid => "appid",
            Self::Countid => "countid",
            Self::Email => "email",
        }
    }
}

/// Resolve a sanitized record against the store.
pub fn resolve(store: &LicenseStore, record: &CleanRecord) -> MatchOutcome {
    if let Some(appid) = record.appid.as_deref() {
        if let Some(license) = store.find_by_appid(appid) {
            return MatchOutcome::Matched {
                license: Box::new(license),
                matched_by: MatchTier::Appid,
            };
        }
    }
    if let Some(countid) = record.countid.as_deref() {
        if let Some(license) = store.find_by_countid(countid) {
            return MatchOutcome::Matched {
                license: Box::new(license),
                matched_by: MatchTier::Countid,
            };
        }
    }
    if let Some(email) = record.email_license.as_deref() {
        if let Some(license) = store.find_by_email(email) {
            return MatchOutcome::Matched {
                license: Box::new(license),
                matched_by: MatchTier::Email,
            };
        }
    }
    MatchOutcome::Unmatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_state::License;

    fn clean(appid: Option<&str>, countid: Option<&str>, email: Option<&str>) -> CleanRecord {
        CleanRecord {
            external_id: "ext".into(),
            appid: appid.map(String::from),
            countid: countid.map(String::from),
            mid: None,
            license_type: None,
            dba: None,
            zip: None,
            status: None,
            activate_date: None,
            coming_expired: None,
            monthly_fee: None,
            sms_balance: None,
            email_license: email.map(String::from),
            package: None,
            note: None,
            workspace: None,
            last_active: None,
        }
    }

    fn store_with(appid: Option<&str>, countid: Option<&str>, email: Option<&str>) -> LicenseStore {
        let store = LicenseStore::new();
        let mut lic = License::new("LIC-ID1", "Acme", "messaging", "pro");
        lic.appid = appid.map(String::from);
        lic.countid = countid.map(String::from);
        lic.email_license = email.map(String::from);
        store.insert(lic, None).unwrap();
        store
    }

    #[test]
    fn appid_wins_over_countid_and_email() {
        let store = store_with(Some("a-1"), Some("c-1"), Some("x@y.z"));
        // A different license holds the countid the record also carries.
        let mut other = License::new("LIC-ID2", "Other", "messaging", "pro");
        other.countid = Some("c-other".into());
        store.insert(other, None).unwrap();

        let outcome = resolve(&store, &clean(Some("a-1"), Some("c-other"), None));
        match outcome {
            MatchOutcome::Matched { license, matched_by } => {
                assert_eq!(license.key, "LIC-ID1");
                assert_eq!(matched_by, MatchTier::Appid);
            }
            MatchOutcome::Unmatched => panic!("expected a match"),
        }
    }

    #[test]
    fn falls_back_to_countid_then_email() {
        let store = store_with(None, Some("c-1"), Some("x@y.z"));

        let by_countid = resolve(&store, &clean(Some("a-miss"), Some("c-1"), None));
        assert!(matches!(
            by_countid,
            MatchOutcome::Matched {
                matched_by: MatchTier::Countid,
                ..
            }
        ));

        let by_email = resolve(&store, &clean(None, Some("c-miss"), Some("x@y.z")));
        assert!(matches!(
            by_email,
            MatchOutcome::Matched {
                matched_by: MatchTier::Email,
                ..
            }
        ));
    }

    #[test]
    fn nothing_matching_is_unmatched() {
        let store = store_with(Some("a-1"), None, None);
        let outcome = resolve(&store, &clean(Some("a-2"), Some("c-2"), Some("n@o.pe")));
        assert!(matches!(outcome, MatchOutcome::Unmatched));
    }
}
