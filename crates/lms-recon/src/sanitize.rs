//! Feed sanitization.
//!
//! The provider encodes "absent" a dozen ways: `null`, `""`, whitespace,
//! the literal strings `"null"` and `"NULL"`, empty arrays and objects,
//! and truncated JSON fragments left over from its own export bugs. All
//! of them normalize to `None` here, before any merge decision looks at
//! the value.
//!
//! A value that *claims* data but cannot be interpreted (a non-numeric
//! balance, an unparseable date) is an error, not an absent value —
//! silently dropping it would let a later merge clobber good internal
//! data with nothing.

use chrono::{DateTime, NaiveDate, Utc};

use lms_provider::ProviderRecord;

/// A provider record after sanitization: every field either carries an
/// interpretable value or is canonically absent.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    /// Stable external identifier.
    pub external_id: String,
    pub appid: Option<String>,
    pub countid: Option<String>,
    pub mid: Option<String>,
    pub license_type: Option<String>,
    pub dba: Option<String>,
    pub zip: Option<String>,
    /// Provider-internal numeric status code, carried opaquely.
    pub status: Option<i64>,
    pub activate_date: Option<DateTime<Utc>>,
    pub coming_expired: Option<bool>,
    pub monthly_fee: Option<f64>,
    pub sms_balance: Option<f64>,
    pub email_license: Option<String>,
    pub package: Option<String>,
    pub note: Option<String>,
    pub workspace: Option<String>,
    pub last_active: Option<DateTime<Utc>>,
}

impl CleanRecord {
    /// Sanitize a raw provider record.
    ///
    /// Returns the field name and problem text on the first
    /// uninterpretable value; junk encodings of "absent" are not errors.
    pub fn from_provider(record: &ProviderRecord) -> Result<Self, String> {
        Ok(Self {
            external_id: record.id.clone(),
            appid: clean_str(record.appid.as_deref()),
            countid: clean_str(record.countid.as_deref()),
            mid: clean_str(record.mid.as_deref()),
            license_type: clean_str(record.license_type.as_deref()),
            dba: clean_str(record.dba.as_deref()),
            zip: clean_str(record.zip.as_deref()),
            status: record.status,
            activate_date: clean_date(record.activate_date.as_deref())
                .map_err(|e| format!("activateDate: {e}"))?,
            coming_expired: clean_bool(record.coming_expired.as_ref())
                .map_err(|e| format!("comingExpired: {e}"))?,
            monthly_fee: clean_number(record.monthly_fee.as_ref())
                .map_err(|e| format!("monthlyFee: {e}"))?,
            sms_balance: clean_number(record.sms_balance.as_ref())
                .map_err(|e| format!("smsBalance: {e}"))?,
            email_license: clean_str(record.email_license.as_deref()),
            package: clean_str(record.package.as_deref()),
            note: clean_str(record.note.as_deref()),
            workspace: clean_str(record.sendbat_workspace.as_deref()),
            last_active: clean_date(record.last_active.as_deref())
                .map_err(|e| format!("lastActive: {e}"))?,
        })
    }
}

/// Normalize a raw string to `None` if it encodes "absent".
pub fn clean_str(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }
    match value {
        "null" | "NULL" | "Null" | "undefined" | "[]" | "{}" => None,
        // Truncated JSON fragments from the provider's export bugs.
        _ if is_malformed_fragment(value) => None,
        _ => Some(value.to_string()),
    }
}

/// A string that starts like JSON but is not valid JSON.
fn is_malformed_fragment(value: &str) -> bool {
    (value.starts_with('{') || value.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(value).is_err()
}

/// Interpret a value that may be a number or a numeric string.
pub fn clean_number(raw: Option<&serde_json::Value>) -> Result<Option<f64>, String> {
    let value = match raw {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(v) => v,
    };
    match value {
        serde_json::Value::Number(n) => Ok(n.as_f64()),
        serde_json::Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s == "null" || s == "NULL" {
                return Ok(None);
            }
            s.parse::<f64>()
                .map(Some)
                .map_err(|_| format!("not a number: {s:?}"))
        }
        other => Err(format!("unexpected shape: {other}")),
    }
}

/// Interpret a value that may be a bool, a 0/1 number, or a string.
pub fn clean_bool(raw: Option<&serde_json::Value>) -> Result<Option<bool>, String> {
    let value = match raw {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(v) => v,
    };
    match value {
        serde_json::Value::Bool(b) => Ok(Some(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            _ => Err(format!("not a boolean: {n}")),
        },
        serde_json::Value::String(s) => match s.trim() {
            "" | "null" | "NULL" => Ok(None),
            "0" | "false" | "False" => Ok(Some(false)),
            "1" | "true" | "True" => Ok(Some(true)),
            other => Err(format!("not a boolean: {other:?}")),
        },
        other => Err(format!("unexpected shape: {other}")),
    }
}

/// Parse a date the feed may format several ways.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, and bare `YYYY-MM-DD`
/// (taken as midnight UTC).
pub fn clean_date(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    let value = match clean_str(raw) {
        Some(v) => v,
        None => return Ok(None),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&value) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(&value, "%Y-%m-%d %H:%M:%S") {
        return Ok(Some(naive.and_utc()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(&value, "%Y-%m-%d") {
        return Ok(Some(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()));
    }
    Err(format!("unparseable date: {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    // ── clean_str ───────────────────────────────────────────────────

    #[test]
    fn absent_encodings_normalize_to_none() {
        for junk in [
            None,
            Some(""),
            Some("   "),
            Some("null"),
            Some("NULL"),
            Some("undefined"),
            Some("[]"),
            Some("{}"),
            Some(r#"{"trunc": "#),
            Some(r#"["half"#),
        ] {
            assert_eq!(clean_str(junk), None, "junk {junk:?} should be absent");
        }
    }

    #[test]
    fn real_strings_survive_trimmed() {
        assert_eq!(clean_str(Some("  Acme ")), Some("Acme".to_string()));
        // Valid JSON content is data, not a fragment.
        assert_eq!(
            clean_str(Some(r#"{"plan":"pro"}"#)),
            Some(r#"{"plan":"pro"}"#.to_string())
        );
    }

    // ── clean_number ────────────────────────────────────────────────

    #[test]
    fn numbers_and_numeric_strings_parse() {
        assert_eq!(clean_number(Some(&json!(18.5))).unwrap(), Some(18.5));
        assert_eq!(clean_number(Some(&json!("49.90"))).unwrap(), Some(49.9));
        assert_eq!(clean_number(Some(&json!("0"))).unwrap(), Some(0.0));
        assert_eq!(clean_number(Some(&json!(null))).unwrap(), None);
        assert_eq!(clean_number(Some(&json!(""))).unwrap(), None);
        assert_eq!(clean_number(None).unwrap(), None);
    }

    #[test]
    fn non_numeric_text_is_an_error_not_absent() {
        assert!(clean_number(Some(&json!("eighteen"))).is_err());
        assert!(clean_number(Some(&json!([1, 2]))).is_err());
    }

    // ── clean_bool ──────────────────────────────────────────────────

    #[test]
    fn bool_shapes_parse() {
        assert_eq!(clean_bool(Some(&json!(true))).unwrap(), Some(true));
        assert_eq!(clean_bool(Some(&json!(0))).unwrap(), Some(false));
        assert_eq!(clean_bool(Some(&json!("1"))).unwrap(), Some(true));
        assert_eq!(clean_bool(Some(&json!("false"))).unwrap(), Some(false));
        assert_eq!(clean_bool(Some(&json!(""))).unwrap(), None);
        assert!(clean_bool(Some(&json!("maybe"))).is_err());
    }

    // ── clean_date ──────────────────────────────────────────────────

    #[test]
    fn date_formats_parse() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap();
        assert_eq!(clean_date(Some("2026-03-05")).unwrap(), Some(expected));
        assert_eq!(
            clean_date(Some("2026-03-05 00:00:00")).unwrap(),
            Some(expected)
        );
        assert_eq!(
            clean_date(Some("2026-03-05T00:00:00Z")).unwrap(),
            Some(expected)
        );
        assert_eq!(clean_date(Some("")).unwrap(), None);
        assert_eq!(clean_date(Some("null")).unwrap(), None);
        assert!(clean_date(Some("last tuesday")).is_err());
    }

    // ── full record ─────────────────────────────────────────────────

    #[test]
    fn dirty_record_sanitizes() {
        let raw: ProviderRecord = serde_json::from_value(json!({
            "id": "ext-1",
            "appid": "  app-1 ",
            "countid": "null",
            "dba": "[]",
            "monthlyFee": "49.90",
            "smsBalance": 18.5,
            "comingExpired": "1",
            "activateDate": "2026-02-01",
            "sendbatWorkspace": "ws-3"
        }))
        .unwrap();

        let clean = CleanRecord::from_provider(&raw).unwrap();
        assert_eq!(clean.appid.as_deref(), Some("app-1"));
        assert_eq!(clean.countid, None);
        assert_eq!(clean.dba, None);
        assert_eq!(clean.monthly_fee, Some(49.9));
        assert_eq!(clean.sms_balance, Some(18.5));
        assert_eq!(clean.coming_expired, Some(true));
        assert_eq!(clean.workspace.as_deref(), Some("ws-3"));
    }

    #[test]
    fn uninterpretable_value_fails_the_record() {
        let raw: ProviderRecord = serde_json::from_value(json!({
            "id": "ext-2",
            "smsBalance": "lots"
        }))
        .unwrap();
        let err = CleanRecord::from_provider(&raw).unwrap_err();
        assert!(err.contains("smsBalance"));
    }
}
