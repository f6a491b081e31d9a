//! External provider snapshot persistence.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use lms_core::{SnapshotId, SyncStatus};

use crate::snapshot::ExternalLicenseSnapshot;

/// Insert or refresh the snapshot for an external record.
pub async fn upsert(pool: &PgPool, snapshot: &ExternalLicenseSnapshot) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO external_license_snapshots
         (id, external_id, payload, sync_status, sync_error, fetched_at, last_synced_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (external_id) DO UPDATE SET
             payload = EXCLUDED.payload,
             sync_status = EXCLUDED.sync_status,
             sync_error = EXCLUDED.sync_error,
             fetched_at = EXCLUDED.fetched_at,
             last_synced_at = EXCLUDED.last_synced_at",
    )
    .bind(snapshot.id.as_uuid())
    .bind(&snapshot.external_id)
    .bind(&snapshot.payload)
    .bind(snapshot.sync_status.as_str())
    .bind(&snapshot.sync_error)
    .bind(snapshot.fetched_at)
    .bind(snapshot.last_synced_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record the sync outcome for an external record.
pub async fn mark(
    pool: &PgPool,
    external_id: &str,
    sync_status: SyncStatus,
    sync_error: Option<&str>,
    synced_at: Option<DateTime<Utc>>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE external_license_snapshots
         SET sync_status = $2, sync_error = $3, last_synced_at = COALESCE($4, last_synced_at)
         WHERE external_id = $1",
    )
    .bind(external_id)
    .bind(sync_status.as_str())
    .bind(sync_error)
    .bind(synced_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Fetch the snapshot for an external record.
pub async fn get(
    pool: &PgPool,
    external_id: &str,
) -> Result<Option<ExternalLicenseSnapshot>, sqlx::Error> {
    let row = sqlx::query_as::<_, SnapshotRow>(
        "SELECT id, external_id, payload, sync_status, sync_error, fetched_at, last_synced_at
         FROM external_license_snapshots WHERE external_id = $1",
    )
    .bind(external_id)
    .fetch_optional(pool)
    .await?;
    row.map(SnapshotRow::into_snapshot).transpose()
}

/// Load all snapshots, for populating the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ExternalLicenseSnapshot>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SnapshotRow>(
        "SELECT id, external_id, payload, sync_status, sync_error, fetched_at, last_synced_at
         FROM external_license_snapshots ORDER BY fetched_at",
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(SnapshotRow::into_snapshot).collect()
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: Uuid,
    external_id: String,
    payload: serde_json::Value,
    sync_status: String,
    sync_error: Option<String>,
    fetched_at: DateTime<Utc>,
    last_synced_at: Option<DateTime<Utc>>,
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<ExternalLicenseSnapshot, sqlx::Error> {
        let sync_status = SyncStatus::from_name(&self.sync_status).ok_or_else(|| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("external_license_snapshots.sync_status: {}", self.sync_status),
            )))
        })?;
        Ok(ExternalLicenseSnapshot {
            id: SnapshotId::from_uuid(self.id),
            external_id: self.external_id,
            payload: self.payload,
            sync_status,
            sync_error: self.sync_error,
            fetched_at: self.fetched_at,
            last_synced_at: self.last_synced_at,
        })
    }
}
