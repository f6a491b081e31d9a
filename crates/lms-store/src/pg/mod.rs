//! Postgres persistence layer.
//!
//! Plain functions over a `sqlx::PgPool`, one file per table. Business
//! rules are enforced at the application layer (the in-memory
//! [`crate::LicenseStore`] and the state machine), not in SQL; the
//! database carries only the constraints that guard integrity across
//! processes — the unique license key, the partial unique index on
//! non-revoked (license, user) pairs, and the append-only audit table.
//!
//! The seat recount runs inside the same transaction as every
//! assignment write, with the license row locked `FOR UPDATE`, so the
//! stored count can never drift from the ledger between processes.

pub mod assignments;
pub mod audit;
pub mod licenses;
pub mod snapshots;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to Postgres with a bounded pool.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await
}

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
