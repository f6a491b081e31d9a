//! Audit event persistence — hash-chained, append-only.
//!
//! The chain head is read and the new event inserted inside one
//! transaction, so concurrent appenders cannot both chain to the same
//! predecessor.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use lms_core::{EventId, UserId};

use crate::audit::{sha256_hex, AuditEvent, ChainIntegrity, ZERO_HASH};

/// Append an audit event, chaining its hash to the stored head.
pub async fn append(
    pool: &PgPool,
    event_type: &str,
    actor_id: Option<UserId>,
    entity_id: &str,
    entity_type: &str,
    metadata: &serde_json::Value,
) -> Result<EventId, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let previous_hash: Option<(String,)> = sqlx::query_as(
        "SELECT event_hash FROM audit_events ORDER BY created_at DESC, id DESC LIMIT 1 FOR UPDATE",
    )
    .fetch_optional(&mut *tx)
    .await?;
    let previous_hash = previous_hash
        .map(|(h,)| h)
        .unwrap_or_else(|| ZERO_HASH.to_string());

    let event_hash = sha256_hex(&format!("{previous_hash}{event_type}{entity_type}{entity_id}"));
    let id = EventId::new();

    sqlx::query(
        "INSERT INTO audit_events (id, event_type, actor_id, entity_id, entity_type,
         metadata, previous_hash, event_hash, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())",
    )
    .bind(id.as_uuid())
    .bind(event_type)
    .bind(actor_id.map(|a| *a.as_uuid()))
    .bind(entity_id)
    .bind(entity_type)
    .bind(metadata)
    .bind(&previous_hash)
    .bind(&event_hash)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(id)
}

/// Events for one entity, oldest first.
pub async fn events_for_entity(
    pool: &PgPool,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<AuditEvent>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditEventRow>(
        "SELECT id, event_type, actor_id, entity_id, entity_type, metadata,
         previous_hash, event_hash, created_at
         FROM audit_events WHERE entity_type = $1 AND entity_id = $2
         ORDER BY created_at, id",
    )
    .bind(entity_type)
    .bind(entity_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(AuditEventRow::into_event).collect())
}

/// Verify hash continuity across the whole stored chain.
pub async fn verify_chain_integrity(pool: &PgPool) -> Result<ChainIntegrity, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT previous_hash, event_hash FROM audit_events ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;

    let total_events = rows.len();
    let mut broken_links = 0;
    let mut last_hash: Option<&str> = None;
    for (previous_hash, event_hash) in &rows {
        if let Some(expected_prev) = last_hash {
            if previous_hash != expected_prev {
                broken_links += 1;
            }
        }
        last_hash = Some(event_hash);
    }

    Ok(ChainIntegrity {
        total_events,
        broken_links,
        chain_valid: broken_links == 0,
    })
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: Uuid,
    event_type: String,
    actor_id: Option<Uuid>,
    entity_id: String,
    entity_type: String,
    metadata: serde_json::Value,
    previous_hash: String,
    event_hash: String,
    created_at: DateTime<Utc>,
}

impl AuditEventRow {
    fn into_event(self) -> AuditEvent {
        AuditEvent {
            id: EventId::from_uuid(self.id),
            event_type: self.event_type,
            actor_id: self.actor_id.map(UserId::from_uuid),
            entity_id: self.entity_id,
            entity_type: self.entity_type,
            metadata: self.metadata,
            previous_hash: self.previous_hash,
            event_hash: self.event_hash,
            created_at: self.created_at,
        }
    }
}
