//! Per-field merge policy.
//!
//! Merging is changeset-based: the policy first computes the exact set
//! of field writes a record would cause, then applies them. An
//! unchanged replay computes an empty changeset and causes zero writes,
//! which is what makes a reconciliation run idempotent.
//!
//! Three field classes, three rules:
//!
//! - **linkage/metadata** (`appid`, `countid`, `mid`, `license_type`,
//!   `package`, `workspace`, `coming_expired`, `zip`, `email_license`)
//!   — the provider is the only source of truth; its value wins
//!   whenever it supplies one. An absent provider value never clears
//!   the internal one.
//! - **date-like** (`starts_at` from the activation date,
//!   `last_active`) — the provider wins only when the internal value is
//!   absent or implausible: equal to today's date, the fingerprint of a
//!   stale default written by a previously failed merge.
//! - **balance-like** (`monthly_fee`, `sms_balance`) — the provider
//!   wins only when the internal value is zero or absent and the
//!   provider supplies non-zero. A real internal balance is never
//!   clobbered by an upstream zero.

use chrono::{DateTime, Utc};
use serde::Serialize;

use lms_core::temporal::same_calendar_day;
use lms_state::{License, SYNC_PLACEHOLDER};

use crate::sanitize::CleanRecord;

/// A typed before/after value for one field write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(Option<String>),
    Number(Option<f64>),
    Flag(Option<bool>),
    Date(Option<DateTime<Utc>>),
}

/// One field write the merge will perform.
#[derive(Debug, Clone, Serialize)]
pub struct FieldChange {
    /// Internal field name.
    pub field: &'static str,
    /// The value being replaced.
    pub old: FieldValue,
    /// The value being written.
    pub new: FieldValue,
}

/// The complete set of writes one record causes on one license.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    changes: Vec<FieldChange>,
}

impl Changeset {
    /// Compute the changeset for merging `record` into `license`.
    pub fn compute(license: &License, record: &CleanRecord, now: DateTime<Utc>) -> Self {
        let mut cs = Self::default();

        // Linkage and metadata: provider wins when it supplies a value.
        cs.text("appid", &license.appid, &record.appid);
        cs.text("countid", &license.countid, &record.countid);
        cs.text("mid", &license.mid, &record.mid);
        cs.text("license_type", &license.license_type, &record.license_type);
        cs.text("package", &license.package, &record.package);
        cs.text("workspace", &license.workspace, &record.workspace);
        cs.text("zip", &license.zip, &record.zip);
        cs.text("email_license", &license.email_license, &record.email_license);
        cs.flag("coming_expired", license.coming_expired, record.coming_expired);

        // A sentinel dba left by a lenient create is upgraded as soon as
        // the provider supplies the real name.
        if license.dba == SYNC_PLACEHOLDER {
            if let Some(dba) = &record.dba {
                cs.push(
                    "dba",
                    FieldValue::Text(Some(license.dba.clone())),
                    FieldValue::Text(Some(dba.clone())),
                );
            }
        }

        // Note: fill only when internally absent.
        if license.note.is_none() {
            cs.text("note", &license.note, &record.note);
        }

        // Date-like: provider wins when internal is absent or stale.
        cs.date(
            "starts_at",
            license.starts_at,
            record.activate_date,
            now,
        );
        cs.date("last_active", license.last_active, record.last_active, now);

        // Balance-like: provider non-zero fills an internal zero.
        cs.balance("monthly_fee", license.monthly_fee, record.monthly_fee);
        cs.balance("sms_balance", license.sms_balance, record.sms_balance);

        cs
    }

    /// Whether the merge would write anything.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The individual field writes.
    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    /// Names of the fields being written, for audit metadata.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.changes.iter().map(|c| c.field).collect()
    }

    /// Apply the computed writes to a license.
    pub fn apply(&self, license: &mut License, now: DateTime<Utc>) {
        for change in &self.changes {
            match (change.field, &change.new) {
                ("appid", FieldValue::Text(v)) => license.appid = v.clone(),
                ("countid", FieldValue::Text(v)) => license.countid = v.clone(),
                ("mid", FieldValue::Text(v)) => license.mid = v.clone(),
                ("license_type", FieldValue::Text(v)) => license.license_type = v.clone(),
                ("package", FieldValue::Text(v)) => license.package = v.clone(),
                ("workspace", FieldValue::Text(v)) => license.workspace = v.clone(),
                ("zip", FieldValue::Text(v)) => license.zip = v.clone(),
                ("email_license", FieldValue::Text(v)) => license.email_license = v.clone(),
                ("dba", FieldValue::Text(Some(v))) => license.dba = v.clone(),
                ("note", FieldValue::Text(v)) => license.note = v.clone(),
                ("coming_expired", FieldValue::Flag(v)) => license.coming_expired = *v,
                ("starts_at", FieldValue::Date(v)) => license.starts_at = *v,
                ("last_active", FieldValue::Date(v)) => license.last_active = *v,
                ("monthly_fee", FieldValue::Number(v)) => license.monthly_fee = *v,
                ("sms_balance", FieldValue::Number(v)) => license.sms_balance = *v,
                _ => {}
            }
        }
        if !self.changes.is_empty() {
            license.updated_at = now;
        }
    }

    fn push(&mut self, field: &'static str, old: FieldValue, new: FieldValue) {
        self.changes.push(FieldChange { field, old, new });
    }

    fn text(&mut self, field: &'static str, internal: &Option<String>, provider: &Option<String>) {
        if let Some(value) = provider {
            if internal.as_deref() != Some(value.as_str()) {
                self.push(
                    field,
                    FieldValue::Text(internal.clone()),
                    FieldValue::Text(Some(value.clone())),
                );
            }
        }
    }

    fn flag(&mut self, field: &'static str, internal: Option<bool>, provider: Option<bool>) {
        if let Some(value) = provider {
            if internal != Some(value) {
                self.push(
                    field,
                    FieldValue::Flag(internal),
                    FieldValue::Flag(Some(value)),
                );
            }
        }
    }

    fn date(
        &mut self,
        field: &'static str,
        internal: Option<DateTime<Utc>>,
        provider: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) {
        let value = match provider {
            Some(v) => v,
            None => return,
        };
        let stale = match internal {
            None => true,
            // Equal-to-today is the fingerprint of a stale default.
            Some(existing) => same_calendar_day(existing, now),
        };
        if stale && internal != Some(value) {
            self.push(
                field,
                FieldValue::Date(internal),
                FieldValue::Date(Some(value)),
            );
        }
    }

    fn balance(&mut self, field: &'static str, internal: Option<f64>, provider: Option<f64>) {
        let value = match provider {
            Some(v) if v != 0.0 => v,
            _ => return,
        };
        let fillable = internal.is_none() || internal == Some(0.0);
        if fillable {
            self.push(
                field,
                FieldValue::Number(internal),
                FieldValue::Number(Some(value)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 10, 0, 0).unwrap()
    }

    fn empty_record() -> CleanRecord {
        CleanRecord {
            external_id: "ext-1".into(),
            appid: None,
            countid: None,
            mid: None,
            license_type: None,
            dba: None,
            zip: None,
            status: None,
            activate_date: None,
            coming_expired: None,
            monthly_fee: None,
            sms_balance: None,
            email_license: None,
            package: None,
            note: None,
            workspace: None,
            last_active: None,
        }
    }

    fn license() -> License {
        License::new("LIC-M1", "Acme", "messaging", "pro")
    }

    #[test]
    fn linkage_fields_always_take_provider_value() {
        let mut lic = license();
        lic.appid = Some("old-app".into());
        let mut rec = empty_record();
        rec.appid = Some("new-app".into());
        rec.workspace = Some("ws-1".into());
        rec.coming_expired = Some(true);

        let now = at(2026, 5, 1);
        let cs = Changeset::compute(&lic, &rec, now);
        assert_eq!(cs.field_names(), vec!["appid", "workspace", "coming_expired"]);

        cs.apply(&mut lic, now);
        assert_eq!(lic.appid.as_deref(), Some("new-app"));
        assert_eq!(lic.workspace.as_deref(), Some("ws-1"));
        assert_eq!(lic.coming_expired, Some(true));
    }

    #[test]
    fn absent_provider_value_never_clears_internal() {
        let mut lic = license();
        lic.appid = Some("keep".into());
        lic.sms_balance = Some(12.0);
        let cs = Changeset::compute(&lic, &empty_record(), at(2026, 5, 1));
        assert!(cs.is_empty());
    }

    #[test]
    fn balance_fills_zero_but_never_clobbers_nonzero() {
        let now = at(2026, 5, 1);

        // Internal 0, provider 18.5: merged 18.5.
        let mut lic = license();
        lic.sms_balance = Some(0.0);
        let mut rec = empty_record();
        rec.sms_balance = Some(18.5);
        let cs = Changeset::compute(&lic, &rec, now);
        cs.apply(&mut lic, now);
        assert_eq!(lic.sms_balance, Some(18.5));

        // Internal 12, provider 0: stays 12.
        let mut lic = license();
        lic.sms_balance = Some(12.0);
        let mut rec = empty_record();
        rec.sms_balance = Some(0.0);
        let cs = Changeset::compute(&lic, &rec, now);
        assert!(cs.is_empty());
        assert_eq!(lic.sms_balance, Some(12.0));

        // Internal 12, provider 99: a real balance is not overwritten.
        let mut rec = empty_record();
        rec.monthly_fee = Some(99.0);
        let mut lic = license();
        lic.monthly_fee = Some(12.0);
        let cs = Changeset::compute(&lic, &rec, now);
        assert!(cs.is_empty());
    }

    #[test]
    fn date_overwrites_only_absent_or_stale_today() {
        let now = at(2026, 5, 10);
        let provider_date = at(2026, 2, 1);

        // Absent internal: filled.
        let mut lic = license();
        let mut rec = empty_record();
        rec.activate_date = Some(provider_date);
        let cs = Changeset::compute(&lic, &rec, now);
        cs.apply(&mut lic, now);
        assert_eq!(lic.starts_at, Some(provider_date));

        // Internal equal to today: the stale-default fingerprint, replaced.
        let mut lic = license();
        lic.starts_at = Some(at(2026, 5, 10));
        let cs = Changeset::compute(&lic, &rec, now);
        cs.apply(&mut lic, now);
        assert_eq!(lic.starts_at, Some(provider_date));

        // Real historical internal date: kept.
        let mut lic = license();
        lic.starts_at = Some(at(2025, 1, 1));
        let cs = Changeset::compute(&lic, &rec, now);
        assert!(cs.is_empty());
    }

    #[test]
    fn sentinel_dba_is_upgraded() {
        let mut lic = license();
        lic.dba = SYNC_PLACEHOLDER.to_string();
        let mut rec = empty_record();
        rec.dba = Some("Real Name Inc".into());
        let now = at(2026, 5, 1);
        let cs = Changeset::compute(&lic, &rec, now);
        cs.apply(&mut lic, now);
        assert_eq!(lic.dba, "Real Name Inc");

        // A real dba is never replaced.
        let cs = Changeset::compute(&lic, &rec, now);
        assert!(cs.is_empty());
    }

    #[test]
    fn replay_of_applied_changeset_is_empty() {
        let mut lic = license();
        let mut rec = empty_record();
        rec.appid = Some("a-1".into());
        rec.sms_balance = Some(18.5);
        rec.activate_date = Some(at(2026, 2, 1));
        let now = at(2026, 5, 1);

        let cs = Changeset::compute(&lic, &rec, now);
        assert!(!cs.is_empty());
        cs.apply(&mut lic, now);

        let replay = Changeset::compute(&lic, &rec, at(2026, 5, 2));
        assert!(replay.is_empty(), "unchanged replay must write nothing");
    }
}
