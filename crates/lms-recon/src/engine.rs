//! The reconciliation run.
//!
//! Processes a bounded batch of provider records against the store.
//! Each record is its own unit of work: its failure is captured on its
//! snapshot and counted, and the run moves on — already-applied writes
//! are never rolled back. A `parking_lot` try-lock guard refuses a
//! second run over the same store while one is in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use thiserror::Error;

use lms_core::{SyncFailure, SyncStatus};
use lms_provider::{ProviderClient, ProviderError, ProviderRecord};
use lms_state::{LicenseDraft, ValidationMode};
use lms_store::LicenseStore;

use crate::identify::{self, MatchOutcome};
use crate::merge::Changeset;
use crate::sanitize::CleanRecord;

/// Errors that abort a whole run (per-record failures never do).
#[derive(Debug, Error)]
pub enum ReconError {
    /// Another run over this store is already in flight.
    #[error("a reconciliation run is already in progress")]
    AlreadyRunning,

    /// The provider feed could not be fetched.
    #[error("provider fetch failed: {0}")]
    Provider(#[from] ProviderError),

    /// A page fetch exceeded its timeout boundary.
    #[error("provider fetch of page {page} timed out after {timeout_secs}s")]
    PageTimeout {
        /// The page that stalled.
        page: u32,
        /// The boundary it exceeded.
        timeout_secs: u64,
    },
}

/// Outcome totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconReport {
    /// Records processed.
    pub total: usize,
    /// New licenses created for unmatched records.
    pub created: usize,
    /// Existing licenses that received field writes.
    pub merged: usize,
    /// Records whose merge was a no-op.
    pub unchanged: usize,
    /// Records that failed; see `errors`.
    pub failed: usize,
    /// The captured per-record failures.
    pub errors: Vec<SyncFailure>,
}

enum RecordOutcome {
    Created,
    Merged,
    Unchanged,
}

/// The reconciliation engine. Cloning shares the run guard.
#[derive(Debug, Clone)]
pub struct ReconEngine {
    store: LicenseStore,
    run_guard: Arc<Mutex<()>>,
}

impl ReconEngine {
    /// Create an engine over a store.
    pub fn new(store: LicenseStore) -> Self {
        Self {
            store,
            run_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Reconcile a batch of provider records.
    pub fn run(
        &self,
        records: &[ProviderRecord],
        now: DateTime<Utc>,
    ) -> Result<ReconReport, ReconError> {
        let _guard = self.run_guard.try_lock().ok_or(ReconError::AlreadyRunning)?;

        let mut report = ReconReport {
            total: records.len(),
            ..ReconReport::default()
        };

        for record in records {
            match self.process_record(record, now) {
                Ok(RecordOutcome::Created) => report.created += 1,
                Ok(RecordOutcome::Merged) => report.merged += 1,
                Ok(RecordOutcome::Unchanged) => report.unchanged += 1,
                Err(failure) => {
                    tracing::warn!(
                        external_id = %failure.external_id,
                        error = %failure.message,
                        "record failed to sync"
                    );
                    self.store.mark_snapshot(
                        &failure.external_id,
                        SyncStatus::Failed,
                        Some(failure.message.clone()),
                        now,
                    );
                    report.failed += 1;
                    report.errors.push(failure);
                }
            }
        }

        tracing::info!(
            total = report.total,
            created = report.created,
            merged = report.merged,
            unchanged = report.unchanged,
            failed = report.failed,
            "reconciliation run finished"
        );
        Ok(report)
    }

    /// Fetch the whole feed and reconcile it.
    ///
    /// Each page fetch carries its own timeout boundary so one slow
    /// provider call cannot stall the run.
    pub async fn run_from_provider(
        &self,
        client: &ProviderClient,
        page_timeout: Duration,
        now: DateTime<Utc>,
    ) -> Result<ReconReport, ReconError> {
        let mut records = Vec::new();
        let mut page = 0;

        loop {
            let fetched = tokio::time::timeout(page_timeout, client.fetch_page(page))
                .await
                .map_err(|_| ReconError::PageTimeout {
                    page,
                    timeout_secs: page_timeout.as_secs(),
                })??;

            let count = fetched.records.len();
            records.extend(fetched.records);

            let done = match fetched.total_pages {
                Some(total) => page + 1 >= total,
                None => count == 0,
            };
            if done {
                break;
            }
            page += 1;
        }

        self.run(&records, now)
    }

    fn process_record(
        &self,
        record: &ProviderRecord,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome, SyncFailure> {
        let external_id = record.id.clone();
        let payload = serde_json::to_value(record)
            .map_err(|e| SyncFailure::new(&external_id, e.to_string()))?;

        // Unchanged payload with a previously good outcome: nothing to do.
        let payload_changed = self.store.upsert_snapshot(&external_id, payload, now);
        if !payload_changed {
            if let Some(snap) = self.store.get_snapshot(&external_id) {
                if snap.sync_status == SyncStatus::Synced {
                    return Ok(RecordOutcome::Unchanged);
                }
            }
        }

        let clean = CleanRecord::from_provider(record)
            .map_err(|e| SyncFailure::new(&external_id, e))?;

        let outcome = match identify::resolve(&self.store, &clean) {
            MatchOutcome::Matched { license, matched_by } => {
                let changeset = Changeset::compute(&license, &clean, now);
                if changeset.is_empty() {
                    // Still record a sync pass if this record was
                    // previously failed or never synced.
                    if license.external_sync_status != SyncStatus::Synced {
                        self.store
                            .try_update::<_, SyncFailure>(license.id, |lic| {
                                lic.external_sync_status = SyncStatus::Synced;
                                lic.last_external_sync = Some(now);
                                lic.external_sync_error = None;
                                Ok(())
                            })
                            .ok_or_else(|| SyncFailure::new(&external_id, "license vanished"))??;
                    }
                    RecordOutcome::Unchanged
                } else {
                    let fields = changeset.field_names();
                    self.store
                        .try_update::<_, SyncFailure>(license.id, |lic| {
                            changeset.apply(lic, now);
                            lic.external_sync_status = SyncStatus::Synced;
                            lic.last_external_sync = Some(now);
                            lic.external_sync_error = None;
                            Ok(())
                        })
                        .ok_or_else(|| SyncFailure::new(&external_id, "license vanished"))??;
                    self.store.audit().append(
                        "license.sync_updated",
                        None,
                        license.id.to_string(),
                        "license",
                        json!({
                            "external_id": external_id,
                            "matched_by": matched_by.as_str(),
                            "fields": fields,
                        }),
                    );
                    RecordOutcome::Merged
                }
            }
            MatchOutcome::Unmatched => {
                let draft = LicenseDraft {
                    dba: clean.dba.clone(),
                    product: clean.package.clone(),
                    plan: clean.license_type.clone(),
                    starts_at: clean.activate_date,
                    email_license: clean.email_license.clone(),
                    note: clean.note.clone(),
                    ..LicenseDraft::default()
                };
                let mut license = draft.build(ValidationMode::Lenient).map_err(|issues| {
                    let text = issues
                        .iter()
                        .map(|i| i.to_string())
                        .collect::<Vec<_>>()
                        .join("; ");
                    SyncFailure::new(&external_id, text)
                })?;

                // Linkage fields go straight through the merge policy so
                // creation and update share one set of rules.
                let changeset = Changeset::compute(&license, &clean, now);
                changeset.apply(&mut license, now);
                license.external_sync_status = SyncStatus::Synced;
                license.last_external_sync = Some(now);

                let id = self
                    .store
                    .insert(license, None)
                    .map_err(|e| SyncFailure::new(&external_id, e.to_string()))?;
                self.store.audit().append(
                    "license.sync_created",
                    None,
                    id.to_string(),
                    "license",
                    json!({"external_id": external_id}),
                );
                RecordOutcome::Created
            }
        };

        self.store
            .mark_snapshot(&external_id, SyncStatus::Synced, None, now);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lms_state::License;
    use serde_json::json;

    fn at(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 9, 0, 0).unwrap()
    }

    fn record(id: &str, appid: &str) -> ProviderRecord {
        serde_json::from_value(json!({
            "id": id,
            "appid": appid,
            "dba": format!("Merchant {id}"),
            "smsBalance": 10.0,
        }))
        .unwrap()
    }

    fn malformed(id: &str) -> ProviderRecord {
        serde_json::from_value(json!({
            "id": id,
            "appid": format!("app-{id}"),
            "smsBalance": "not a number",
        }))
        .unwrap()
    }

    #[test]
    fn unmatched_records_create_licenses() {
        let engine = ReconEngine::new(LicenseStore::new());
        let report = engine
            .run(&[record("e1", "app-1"), record("e2", "app-2")], at(2026, 4, 1))
            .unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(engine.store.len(), 2);
        let lic = engine.store.find_by_appid("app-1").unwrap();
        assert_eq!(lic.dba, "Merchant e1");
        assert_eq!(lic.sms_balance, Some(10.0));
        assert_eq!(lic.external_sync_status, SyncStatus::Synced);
    }

    #[test]
    fn one_malformed_record_does_not_abort_the_batch() {
        let engine = ReconEngine::new(LicenseStore::new());
        let mut batch: Vec<ProviderRecord> =
            (1..=10).map(|i| record(&format!("e{i}"), &format!("app-{i}"))).collect();
        batch[4] = malformed("e5");

        let report = engine.run(&batch, at(2026, 4, 1)).unwrap();
        assert_eq!(report.total, 10);
        assert_eq!(report.created, 9);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].external_id, "e5");

        let snap = engine.store.get_snapshot("e5").unwrap();
        assert_eq!(snap.sync_status, SyncStatus::Failed);
        assert!(snap.sync_error.as_deref().unwrap_or("").contains("smsBalance"));

        // The other nine are synced.
        let synced = engine
            .store
            .snapshots()
            .iter()
            .filter(|s| s.sync_status == SyncStatus::Synced)
            .count();
        assert_eq!(synced, 9);
    }

    #[test]
    fn replaying_an_unchanged_batch_writes_nothing() {
        let engine = ReconEngine::new(LicenseStore::new());
        let batch = vec![record("e1", "app-1")];
        let now = at(2026, 4, 1);

        engine.run(&batch, now).unwrap();
        let license_before = engine.store.find_by_appid("app-1").unwrap();
        let audit_before = engine.store.audit().len();

        let replay = engine.run(&batch, at(2026, 4, 2)).unwrap();
        assert_eq!(replay.unchanged, 1);
        assert_eq!(replay.created + replay.merged + replay.failed, 0);

        let license_after = engine.store.find_by_appid("app-1").unwrap();
        assert_eq!(license_after.updated_at, license_before.updated_at);
        assert_eq!(license_after.last_external_sync, license_before.last_external_sync);
        assert_eq!(engine.store.audit().len(), audit_before);
    }

    #[test]
    fn matched_record_merges_into_existing_license() {
        let store = LicenseStore::new();
        let mut lic = License::new("LIC-E1", "Acme", "messaging", "pro");
        lic.appid = Some("app-1".into());
        lic.sms_balance = Some(0.0);
        let id = store.insert(lic, None).unwrap();

        let engine = ReconEngine::new(store);
        let report = engine.run(&[record("e1", "app-1")], at(2026, 4, 1)).unwrap();

        assert_eq!(report.merged, 1);
        assert_eq!(report.created, 0);
        let merged = engine.store.get(id).unwrap();
        assert_eq!(merged.sms_balance, Some(10.0));
        // dba was real, not a sentinel: kept.
        assert_eq!(merged.dba, "Acme");

        let events = engine.store.audit().for_entity("license", &id.to_string());
        assert!(events.iter().any(|e| e.event_type == "license.sync_updated"));
    }

    #[test]
    fn concurrent_runs_are_refused() {
        let engine = ReconEngine::new(LicenseStore::new());
        let _held = engine.run_guard.lock();

        let second = engine.clone();
        let err = second.run(&[record("e1", "app-1")], at(2026, 4, 1)).unwrap_err();
        assert!(matches!(err, ReconError::AlreadyRunning));
    }

    #[test]
    fn failed_record_recovers_on_corrected_payload() {
        let engine = ReconEngine::new(LicenseStore::new());
        engine.run(&[malformed("e1")], at(2026, 4, 1)).unwrap();
        assert_eq!(
            engine.store.get_snapshot("e1").unwrap().sync_status,
            SyncStatus::Failed
        );

        let report = engine.run(&[record("e1", "app-1")], at(2026, 4, 2)).unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(
            engine.store.get_snapshot("e1").unwrap().sync_status,
            SyncStatus::Synced
        );
    }
}
