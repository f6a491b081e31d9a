//! Seat assignment persistence.
//!
//! Every write runs in a transaction that locks the license row
//! `FOR UPDATE` and recounts `seats_used` from the live assignment rows
//! before committing, so the stored count can never drift from the rows
//! it summarizes.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use lms_core::{AssignmentId, LicenseId, UserId};
use lms_state::{Assignment, AssignmentStatus};

/// Write one assignment row, inserting or updating by id, and recount
/// the license's seats atomically.
///
/// Row lifecycle is one-way, so on conflict only `status` and
/// `revoked_at` can change.
pub async fn upsert(pool: &PgPool, assignment: &Assignment) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    lock_license(&mut tx, assignment.license_id).await?;

    sqlx::query(
        "INSERT INTO assignments (id, license_id, user_id, status, assigned_at, revoked_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (id) DO UPDATE
         SET status = EXCLUDED.status, revoked_at = EXCLUDED.revoked_at",
    )
    .bind(assignment.id.as_uuid())
    .bind(assignment.license_id.as_uuid())
    .bind(assignment.user_id.as_uuid())
    .bind(assignment.status.as_str())
    .bind(assignment.assigned_at)
    .bind(assignment.revoked_at)
    .execute(&mut *tx)
    .await?;

    recount_seats(&mut tx, assignment.license_id).await?;

    tx.commit().await
}

/// Load all assignments, for populating the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Assignment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AssignmentRow>(
        "SELECT id, license_id, user_id, status, assigned_at, revoked_at
         FROM assignments ORDER BY assigned_at",
    )
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(AssignmentRow::into_assignment).collect()
}

async fn lock_license(
    tx: &mut Transaction<'_, Postgres>,
    license_id: LicenseId,
) -> Result<(), sqlx::Error> {
    let locked: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM licenses WHERE id = $1 FOR UPDATE")
        .bind(license_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;
    if locked.is_none() {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

async fn recount_seats(
    tx: &mut Transaction<'_, Postgres>,
    license_id: LicenseId,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE licenses SET seats_used = (
             SELECT COUNT(*) FROM assignments
             WHERE license_id = $1 AND status = 'assigned'
         ), updated_at = NOW()
         WHERE id = $1",
    )
    .bind(license_id.as_uuid())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: Uuid,
    license_id: Uuid,
    user_id: Uuid,
    status: String,
    assigned_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl AssignmentRow {
    fn into_assignment(self) -> Result<Assignment, sqlx::Error> {
        let status = AssignmentStatus::from_name(&self.status).ok_or_else(|| {
            sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("assignments.status: {}", self.status),
            )))
        })?;
        Ok(Assignment {
            id: AssignmentId::from_uuid(self.id),
            license_id: LicenseId::from_uuid(self.license_id),
            user_id: UserId::from_uuid(self.user_id),
            status,
            assigned_at: self.assigned_at,
            revoked_at: self.revoked_at,
        })
    }
}
