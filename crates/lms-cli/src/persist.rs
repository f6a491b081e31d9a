//! Load/store bridge between Postgres and the in-memory repository.
//!
//! The engines run against the in-memory [`LicenseStore`]; these
//! helpers hydrate it from the database before a run and write the
//! results back after.

use anyhow::{Context, Result};
use sqlx::PgPool;

use lms_store::{pg, LicenseStore};

/// Environment variable naming the Postgres database.
pub const DATABASE_URL_VAR: &str = "LMS_DATABASE_URL";

/// Connect to the database named by `--database-url` or the environment.
pub async fn connect(database_url: Option<&str>) -> Result<PgPool> {
    let url = match database_url {
        Some(url) => url.to_string(),
        None => std::env::var(DATABASE_URL_VAR)
            .with_context(|| format!("{DATABASE_URL_VAR} is not set and --database-url was not given"))?,
    };
    let pool = pg::connect(&url).await.context("connecting to database")?;
    pg::run_migrations(&pool).await.context("running migrations")?;
    Ok(pool)
}

/// Hydrate the in-memory store from the database.
pub async fn load_store(pool: &PgPool) -> Result<LicenseStore> {
    let licenses = pg::licenses::load_all(pool).await.context("loading licenses")?;
    let assignments = pg::assignments::load_all(pool)
        .await
        .context("loading assignments")?;
    let snapshots = pg::snapshots::load_all(pool).await.context("loading snapshots")?;
    tracing::debug!(
        licenses = licenses.len(),
        assignments = assignments.len(),
        snapshots = snapshots.len(),
        "hydrated store"
    );
    Ok(LicenseStore::hydrate(licenses, assignments, snapshots))
}

/// Write the store's state back to the database.
///
/// Licenses are upserted by id, then assignment rows (licenses first,
/// the ledger references them), then snapshots by external id; the
/// audit events the run recorded are appended to the database chain. An
/// audit append failure is reported and skipped, never allowed to fail
/// the run that produced it.
pub async fn save_store(pool: &PgPool, store: &LicenseStore) -> Result<()> {
    for license in store.all_licenses() {
        let updated = pg::licenses::update(pool, &license)
            .await
            .with_context(|| format!("writing license {}", license.id))?;
        if !updated {
            pg::licenses::insert(pool, &license)
                .await
                .with_context(|| format!("inserting license {}", license.id))?;
        }
    }
    for assignment in store.all_assignments() {
        pg::assignments::upsert(pool, &assignment)
            .await
            .with_context(|| format!("writing assignment {}", assignment.id))?;
    }
    for snapshot in store.snapshots() {
        pg::snapshots::upsert(pool, &snapshot)
            .await
            .with_context(|| format!("writing snapshot {}", snapshot.external_id))?;
    }
    for event in store.audit().events() {
        let result = pg::audit::append(
            pool,
            &event.event_type,
            event.actor_id,
            &event.entity_id,
            &event.entity_type,
            &event.metadata,
        )
        .await;
        if let Err(e) = result {
            tracing::error!(event = %event.event_type, entity = %event.entity_id, error = %e,
                "failed to persist audit event");
        }
    }
    Ok(())
}
