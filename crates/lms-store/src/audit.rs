//! Audit event log — immutable hash chain.
//!
//! Every state mutation on a license or assignment — human- or
//! system-triggered — appends one audit event with a SHA-256 hash
//! chaining to the previous event. This forms a tamper-evident log and
//! is the sole place to reconstruct "what happened and why".
//!
//! Appending never fails the triggering mutation: callers treat the log
//! as fire-and-forget, and the Postgres layer reports (but does not
//! propagate) append failures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use lms_core::{EventId, UserId};

/// Hash of the chain head before the first event.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// An immutable audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier.
    pub id: EventId,
    /// Namespaced `category.action`, e.g. `"license.status_changed"`.
    pub event_type: String,
    /// Who triggered the mutation; `None` for system events.
    pub actor_id: Option<UserId>,
    /// Identifier of the affected entity (UUID or external id).
    pub entity_id: String,
    /// Kind of the affected entity, e.g. `"license"`, `"assignment"`.
    pub entity_type: String,
    /// Structured event context.
    pub metadata: serde_json::Value,
    /// Hash of the previous event in the chain.
    pub previous_hash: String,
    /// Hash of this event.
    pub event_hash: String,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

/// Append-only, hash-chained audit log.
///
/// Cloning shares the underlying log.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl AuditLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, chaining its hash to the current head.
    pub fn append(
        &self,
        event_type: &str,
        actor_id: Option<UserId>,
        entity_id: String,
        entity_type: &str,
        metadata: serde_json::Value,
    ) -> EventId {
        let id = EventId::new();
        let created_at = Utc::now();
        let mut events = self.events.lock();

        let previous_hash = events
            .last()
            .map(|e| e.event_hash.clone())
            .unwrap_or_else(|| ZERO_HASH.to_string());
        let event_hash = sha256_hex(&format!(
            "{previous_hash}{event_type}{entity_type}{entity_id}"
        ));

        events.push(AuditEvent {
            id,
            event_type: event_type.to_string(),
            actor_id,
            entity_id,
            entity_type: entity_type.to_string(),
            metadata,
            previous_hash,
            event_hash,
            created_at,
        });
        id
    }

    /// All events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Events for one entity, oldest first.
    pub fn for_entity(&self, entity_type: &str, entity_id: &str) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .cloned()
            .collect()
    }

    /// Number of events recorded.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verify hash continuity across the whole chain.
    pub fn verify_chain(&self) -> ChainIntegrity {
        let events = self.events.lock();
        let total = events.len();
        let mut broken_links = 0;
        let mut last_hash: Option<&str> = None;

        for event in events.iter() {
            if let Some(expected_prev) = last_hash {
                if event.previous_hash != expected_prev {
                    broken_links += 1;
                }
            }
            last_hash = Some(&event.event_hash);
        }

        ChainIntegrity {
            total_events: total,
            broken_links,
            chain_valid: broken_links == 0,
        }
    }
}

/// Result of chain integrity verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainIntegrity {
    /// Events examined.
    pub total_events: usize,
    /// Chain links whose `previous_hash` did not match.
    pub broken_links: usize,
    /// Whether the chain is intact.
    pub chain_valid: bool,
}

/// Compute SHA-256 hex digest of input string.
pub(crate) fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    result.iter().map(|b| format!("{b:02x}")).collect()
}
