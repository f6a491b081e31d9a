//! License persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `licenses` table.
//! Status strings and JSONB bookkeeping columns are serialized through
//! the same serde shapes as the domain types — a serialization failure
//! is an error, never a silent default that would corrupt the record on
//! reload.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use lms_core::{LicenseId, SyncStatus};
use lms_state::{License, LicenseStatus};

/// Serialize a JSONB bookkeeping column.
fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, column = what, "failed to serialize license column");
        sqlx::Error::Encode(Box::new(e))
    })
}

fn decode_err(what: &str, detail: String) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("{what}: {detail}"),
    )))
}

/// Insert a new license record.
pub async fn insert(pool: &PgPool, license: &License) -> Result<(), sqlx::Error> {
    let reminders = to_json(&license.renewal_reminders_sent, "renewal_reminders_sent")?;
    let history = to_json(&license.renewal_history, "renewal_history")?;

    sqlx::query(
        "INSERT INTO licenses (id, key, dba, product, plan, term, seats_total, seats_used,
         starts_at, expires_at, cancel_date, last_active, status,
         renewal_reminders_sent, last_renewal_reminder, renewal_due_date,
         auto_suspend_enabled, grace_period_days, suspension_reason, suspended_at,
         reactivated_at, renewal_history, appid, countid, mid, license_type,
         monthly_fee, sms_balance, email_license, package, workspace, coming_expired,
         note, zip, external_sync_status, last_external_sync, external_sync_error,
         created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                 $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30,
                 $31, $32, $33, $34, $35, $36, $37, $38, $39)",
    )
    .bind(license.id.as_uuid())
    .bind(&license.key)
    .bind(&license.dba)
    .bind(&license.product)
    .bind(&license.plan)
    .bind(&license.term)
    .bind(license.seats_total as i32)
    .bind(license.seats_used as i32)
    .bind(license.starts_at)
    .bind(license.expires_at)
    .bind(license.cancel_date)
    .bind(license.last_active)
    .bind(license.status.as_str())
    .bind(&reminders)
    .bind(license.last_renewal_reminder)
    .bind(license.renewal_due_date)
    .bind(license.auto_suspend_enabled)
    .bind(license.grace_period_days)
    .bind(&license.suspension_reason)
    .bind(license.suspended_at)
    .bind(license.reactivated_at)
    .bind(&history)
    .bind(&license.appid)
    .bind(&license.countid)
    .bind(&license.mid)
    .bind(&license.license_type)
    .bind(license.monthly_fee)
    .bind(license.sms_balance)
    .bind(&license.email_license)
    .bind(&license.package)
    .bind(&license.workspace)
    .bind(license.coming_expired)
    .bind(&license.note)
    .bind(&license.zip)
    .bind(license.external_sync_status.as_str())
    .bind(license.last_external_sync)
    .bind(&license.external_sync_error)
    .bind(license.created_at)
    .bind(license.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Update a license record in full.
///
/// The in-memory store is authoritative; this writes its current view
/// back. Returns `false` when the id is unknown.
pub async fn update(pool: &PgPool, license: &License) -> Result<bool, sqlx::Error> {
    let reminders = to_json(&license.renewal_reminders_sent, "renewal_reminders_sent")?;
    let history = to_json(&license.renewal_history, "renewal_history")?;

    let result = sqlx::query(
        "UPDATE licenses SET key = $2, dba = $3, product = $4, plan = $5, term = $6,
         seats_total = $7, seats_used = $8, starts_at = $9, expires_at = $10,
         cancel_date = $11, last_active = $12, status = $13,
         renewal_reminders_sent = $14, last_renewal_reminder = $15,
         renewal_due_date = $16, auto_suspend_enabled = $17, grace_period_days = $18,
         suspension_reason = $19, suspended_at = $20, reactivated_at = $21,
         renewal_history = $22, appid = $23, countid = $24, mid = $25,
         license_type = $26, monthly_fee = $27, sms_balance = $28,
         email_license = $29, package = $30, workspace = $31, coming_expired = $32,
         note = $33, zip = $34, external_sync_status = $35, last_external_sync = $36,
         external_sync_error = $37, updated_at = $38
         WHERE id = $1",
    )
    .bind(license.id.as_uuid())
    .bind(&license.key)
    .bind(&license.dba)
    .bind(&license.product)
    .bind(&license.plan)
    .bind(&license.term)
    .bind(license.seats_total as i32)
    .bind(license.seats_used as i32)
    .bind(license.starts_at)
    .bind(license.expires_at)
    .bind(license.cancel_date)
    .bind(license.last_active)
    .bind(license.status.as_str())
    .bind(&reminders)
    .bind(license.last_renewal_reminder)
    .bind(license.renewal_due_date)
    .bind(license.auto_suspend_enabled)
    .bind(license.grace_period_days)
    .bind(&license.suspension_reason)
    .bind(license.suspended_at)
    .bind(license.reactivated_at)
    .bind(&history)
    .bind(&license.appid)
    .bind(&license.countid)
    .bind(&license.mid)
    .bind(&license.license_type)
    .bind(license.monthly_fee)
    .bind(license.sms_balance)
    .bind(&license.email_license)
    .bind(&license.package)
    .bind(&license.workspace)
    .bind(license.coming_expired)
    .bind(&license.note)
    .bind(&license.zip)
    .bind(license.external_sync_status.as_str())
    .bind(license.last_external_sync)
    .bind(&license.external_sync_error)
    .bind(license.updated_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load all licenses, for populating the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<License>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LicenseRow>(&select("ORDER BY created_at"))
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(LicenseRow::into_license).collect()
}

fn select(suffix: &str) -> String {
    format!(
        "SELECT id, key, dba, product, plan, term, seats_total, seats_used, starts_at,
         expires_at, cancel_date, last_active, status, renewal_reminders_sent,
         last_renewal_reminder, renewal_due_date, auto_suspend_enabled,
         grace_period_days, suspension_reason, suspended_at, reactivated_at,
         renewal_history, appid, countid, mid, license_type, monthly_fee, sms_balance,
         email_license, package, workspace, coming_expired, note, zip,
         external_sync_status, last_external_sync, external_sync_error,
         created_at, updated_at
         FROM licenses {suffix}"
    )
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct LicenseRow {
    id: Uuid,
    key: String,
    dba: String,
    product: String,
    plan: String,
    term: Option<String>,
    seats_total: i32,
    seats_used: i32,
    starts_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    cancel_date: Option<DateTime<Utc>>,
    last_active: Option<DateTime<Utc>>,
    status: String,
    renewal_reminders_sent: serde_json::Value,
    last_renewal_reminder: Option<DateTime<Utc>>,
    renewal_due_date: Option<DateTime<Utc>>,
    auto_suspend_enabled: bool,
    grace_period_days: i64,
    suspension_reason: Option<String>,
    suspended_at: Option<DateTime<Utc>>,
    reactivated_at: Option<DateTime<Utc>>,
    renewal_history: serde_json::Value,
    appid: Option<String>,
    countid: Option<String>,
    mid: Option<String>,
    license_type: Option<String>,
    monthly_fee: Option<f64>,
    sms_balance: Option<f64>,
    email_license: Option<String>,
    package: Option<String>,
    workspace: Option<String>,
    coming_expired: Option<bool>,
    note: Option<String>,
    zip: Option<String>,
    external_sync_status: String,
    last_external_sync: Option<DateTime<Utc>>,
    external_sync_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LicenseRow {
    fn into_license(self) -> Result<License, sqlx::Error> {
        let status = LicenseStatus::from_name(&self.status)
            .ok_or_else(|| decode_err("licenses.status", self.status.clone()))?;
        let external_sync_status = SyncStatus::from_name(&self.external_sync_status)
            .ok_or_else(|| {
                decode_err("licenses.external_sync_status", self.external_sync_status.clone())
            })?;
        let renewal_reminders_sent = serde_json::from_value(self.renewal_reminders_sent)
            .map_err(|e| decode_err("licenses.renewal_reminders_sent", e.to_string()))?;
        let renewal_history = serde_json::from_value(self.renewal_history)
            .map_err(|e| decode_err("licenses.renewal_history", e.to_string()))?;

        Ok(License {
            id: LicenseId::from_uuid(self.id),
            key: self.key,
            dba: self.dba,
            product: self.product,
            plan: self.plan,
            term: self.term,
            seats_total: self.seats_total.max(0) as u32,
            seats_used: self.seats_used.max(0) as u32,
            starts_at: self.starts_at,
            expires_at: self.expires_at,
            cancel_date: self.cancel_date,
            last_active: self.last_active,
            status,
            renewal_reminders_sent,
            last_renewal_reminder: self.last_renewal_reminder,
            renewal_due_date: self.renewal_due_date,
            auto_suspend_enabled: self.auto_suspend_enabled,
            grace_period_days: self.grace_period_days,
            suspension_reason: self.suspension_reason,
            suspended_at: self.suspended_at,
            reactivated_at: self.reactivated_at,
            renewal_history,
            appid: self.appid,
            countid: self.countid,
            mid: self.mid,
            license_type: self.license_type,
            monthly_fee: self.monthly_fee,
            sms_balance: self.sms_balance,
            email_license: self.email_license,
            package: self.package,
            workspace: self.workspace,
            coming_expired: self.coming_expired,
            note: self.note,
            zip: self.zip,
            external_sync_status,
            last_external_sync: self.last_external_sync,
            external_sync_error: self.external_sync_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
