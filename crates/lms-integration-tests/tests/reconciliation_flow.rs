//! End-to-end reconciliation: provider records through sanitize,
//! identify, and merge into the store, with partial-failure isolation
//! and idempotent replay.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use lms_core::SyncStatus;
use lms_provider::ProviderRecord;
use lms_recon::ReconEngine;
use lms_state::{License, SYNC_PLACEHOLDER};
use lms_store::LicenseStore;

fn at(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, 9, 0, 0).unwrap()
}

fn record(value: serde_json::Value) -> ProviderRecord {
    serde_json::from_value(value).unwrap()
}

#[test]
fn batch_with_one_malformed_record_yields_nine_synced_one_failed() {
    let store = LicenseStore::new();
    let engine = ReconEngine::new(store.clone());

    let mut batch: Vec<ProviderRecord> = (1..=10)
        .map(|i| {
            record(json!({
                "id": format!("ext-{i}"),
                "appid": format!("app-{i}"),
                "dba": format!("Merchant {i}"),
                "smsBalance": 5.0,
            }))
        })
        .collect();
    // Record #5 carries a balance that claims data but cannot be read.
    batch[4] = record(json!({
        "id": "ext-5",
        "appid": "app-5",
        "smsBalance": "18,5",
    }));

    let report = engine.run(&batch, at(2026, 4, 1)).unwrap();
    assert_eq!(report.total, 10);
    assert_eq!(report.created, 9);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors[0].external_id, "ext-5");

    let (synced, failed): (Vec<_>, Vec<_>) = store
        .snapshots()
        .into_iter()
        .partition(|s| s.sync_status == SyncStatus::Synced);
    assert_eq!(synced.len(), 9);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].external_id, "ext-5");
    assert!(failed[0].sync_error.is_some(), "error text must be persisted");
}

#[test]
fn replay_of_unchanged_feed_produces_zero_writes() {
    let store = LicenseStore::new();
    let engine = ReconEngine::new(store.clone());
    let batch = vec![record(json!({
        "id": "ext-1",
        "appid": "app-1",
        "dba": "Acme",
        "monthlyFee": "49.90",
    }))];

    engine.run(&batch, at(2026, 4, 1)).unwrap();
    let before = store.find_by_appid("app-1").unwrap();
    let audit_before = store.audit().len();

    // Replay on later days: no new writes, no new audit events.
    for day in 2..=4 {
        let report = engine.run(&batch, at(2026, 4, day)).unwrap();
        assert_eq!(report.unchanged, 1, "day {day}");
        assert_eq!(report.created + report.merged + report.failed, 0);
    }

    let after = store.find_by_appid("app-1").unwrap();
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(store.audit().len(), audit_before);
}

#[test]
fn balance_merge_respects_internal_truth() {
    let store = LicenseStore::new();

    // One license with no balance yet, one with a real balance.
    let mut empty = License::new("LIC-R1", "Empty Balance", "messaging", "pro");
    empty.appid = Some("app-zero".into());
    empty.sms_balance = Some(0.0);
    store.insert(empty, None).unwrap();

    let mut real = License::new("LIC-R2", "Real Balance", "messaging", "pro");
    real.appid = Some("app-real".into());
    real.sms_balance = Some(12.0);
    store.insert(real, None).unwrap();

    let engine = ReconEngine::new(store.clone());
    let batch = vec![
        record(json!({"id": "e1", "appid": "app-zero", "smsBalance": 18.5})),
        record(json!({"id": "e2", "appid": "app-real", "smsBalance": 0})),
    ];
    engine.run(&batch, at(2026, 4, 1)).unwrap();

    assert_eq!(
        store.find_by_appid("app-zero").unwrap().sms_balance,
        Some(18.5),
        "provider non-zero fills internal zero"
    );
    assert_eq!(
        store.find_by_appid("app-real").unwrap().sms_balance,
        Some(12.0),
        "provider zero never clobbers a real balance"
    );
}

#[test]
fn unmatched_record_creates_then_later_records_merge_into_it() {
    let store = LicenseStore::new();
    let engine = ReconEngine::new(store.clone());

    // First sight: no identifiers match anything; a license is created
    // with a sentinel dba.
    engine
        .run(
            &[record(json!({"id": "e1", "appid": "app-new"}))],
            at(2026, 4, 1),
        )
        .unwrap();
    let created = store.find_by_appid("app-new").unwrap();
    assert_eq!(created.dba, SYNC_PLACEHOLDER);
    assert!(created.key.starts_with("LIC-"));
    assert_eq!(created.external_sync_status, SyncStatus::Synced);

    // The provider later supplies the real name and linkage.
    let report = engine
        .run(
            &[record(json!({
                "id": "e1",
                "appid": "app-new",
                "dba": "Now Named Inc",
                "countid": "c-9",
                "mid": "m-9",
            }))],
            at(2026, 4, 8),
        )
        .unwrap();
    assert_eq!(report.merged, 1);

    let merged = store.find_by_appid("app-new").unwrap();
    assert_eq!(merged.id, created.id, "must merge, not create a duplicate");
    assert_eq!(merged.dba, "Now Named Inc");
    assert_eq!(merged.countid.as_deref(), Some("c-9"));
    assert_eq!(store.len(), 1);
}

#[test]
fn identifier_fallback_matches_countid_and_email() {
    let store = LicenseStore::new();
    let mut by_count = License::new("LIC-C", "By Count", "messaging", "pro");
    by_count.countid = Some("c-1".into());
    store.insert(by_count, None).unwrap();
    let mut by_email = License::new("LIC-E", "By Email", "messaging", "pro");
    by_email.email_license = Some("ops@acme.example".into());
    store.insert(by_email, None).unwrap();

    let engine = ReconEngine::new(store.clone());
    let report = engine
        .run(
            &[
                record(json!({"id": "e1", "countid": "c-1", "mid": "m-1"})),
                record(json!({"id": "e2", "emailLicense": "ops@acme.example", "mid": "m-2"})),
            ],
            at(2026, 4, 1),
        )
        .unwrap();
    assert_eq!(report.merged, 2);
    assert_eq!(report.created, 0);
    assert_eq!(store.get_by_key("LIC-C").unwrap().mid.as_deref(), Some("m-1"));
    assert_eq!(store.get_by_key("LIC-E").unwrap().mid.as_deref(), Some("m-2"));
}

#[test]
fn sync_events_land_in_the_audit_chain() {
    let store = LicenseStore::new();
    let engine = ReconEngine::new(store.clone());
    engine
        .run(
            &[record(json!({"id": "e1", "appid": "app-1", "dba": "Acme"}))],
            at(2026, 4, 1),
        )
        .unwrap();

    let events = store.audit().events();
    assert!(events.iter().any(|e| e.event_type == "license.sync_created"));
    let integrity = store.audit().verify_chain();
    assert!(integrity.chain_valid);
}
