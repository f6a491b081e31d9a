//! Lifecycle policy passes over the store: reminder scheduling, expiry
//! marking, grace-period-gated suspension, and renewal back to active.

use std::sync::Arc;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};

use lms_core::ReminderWindow;
use lms_policy::{LoggingNotifier, Notifier, NotifyError, PolicyEngine};
use lms_state::{License, LicenseStatus, TransitionContext};
use lms_store::LicenseStore;

fn at(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, 9, 0, 0).unwrap()
}

fn active_license(key: &str, expires: DateTime<Utc>) -> License {
    let mut lic = License::new(key, "Acme", "messaging", "pro");
    lic.expires_at = Some(expires);
    lic.transition(TransitionContext::system(LicenseStatus::Active, at(2026, 1, 1)))
        .unwrap();
    lic
}

/// A notifier that records every request it receives.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, ReminderWindow)>>,
}

impl Notifier for RecordingNotifier {
    fn send_reminder(&self, license: &License, window: ReminderWindow) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((license.key.clone(), window));
        Ok(())
    }
}

/// A notifier that always fails delivery.
struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send_reminder(&self, _: &License, _: ReminderWindow) -> Result<(), NotifyError> {
        Err(NotifyError("smtp down".into()))
    }
}

#[test]
fn seven_day_reminder_fires_exactly_once_across_passes() {
    let store = LicenseStore::new();
    let notifier = Arc::new(RecordingNotifier::default());
    store
        .insert(active_license("LIC-REM", at(2026, 6, 10)), None)
        .unwrap();
    let engine = PolicyEngine::new(store.clone(), notifier.clone());

    // Five days out, repeated daily.
    let mut total = 0;
    for day in 5..=9 {
        let report = engine.run_pass(at(2026, 6, day));
        total += report.reminders_sent;
    }
    // 7-day window at five days out, 1-day window the day before expiry.
    let sent = notifier.sent.lock().unwrap();
    assert_eq!(total, 2);
    assert_eq!(sent[0], ("LIC-REM".into(), ReminderWindow::SevenDay));
    assert_eq!(sent[1], ("LIC-REM".into(), ReminderWindow::OneDay));
}

#[test]
fn every_window_fires_once_over_a_full_horizon() {
    let store = LicenseStore::new();
    let notifier = Arc::new(RecordingNotifier::default());
    store
        .insert(active_license("LIC-HOR", at(2026, 6, 30)), None)
        .unwrap();
    let engine = PolicyEngine::new(store.clone(), notifier.clone());

    // Daily passes from 40 days out to expiry day.
    for day_offset in 0..=40 {
        let now = at(2026, 5, 21) + chrono::Duration::days(day_offset);
        engine.run_pass(now);
    }

    let sent = notifier.sent.lock().unwrap();
    let windows: Vec<ReminderWindow> = sent.iter().map(|(_, w)| *w).collect();
    assert_eq!(
        windows,
        vec![
            ReminderWindow::ThirtyDay,
            ReminderWindow::SevenDay,
            ReminderWindow::OneDay
        ]
    );
}

#[test]
fn notifier_failure_never_fails_the_pass_or_refires() {
    let store = LicenseStore::new();
    store
        .insert(active_license("LIC-FAIL", at(2026, 6, 10)), None)
        .unwrap();
    let engine = PolicyEngine::new(store.clone(), Arc::new(FailingNotifier));

    let first = engine.run_pass(at(2026, 6, 5));
    assert!(first.failures.is_empty(), "delivery failure must not fail the pass");
    assert_eq!(first.reminders_sent, 1);

    // Delivery retries belong to the collaborator: the window stays sent.
    let second = engine.run_pass(at(2026, 6, 6));
    assert_eq!(second.reminders_sent, 0);
}

#[test]
fn suspension_grace_matrix() {
    // expires_at 40 days before the pass; 30-day grace suspends,
    // 45-day grace does not.
    let cases = [(30, true), (45, false)];
    for (grace_days, expect_suspended) in cases {
        let store = LicenseStore::new();
        let mut lic = active_license("LIC-GRC", at(2026, 5, 1));
        lic.auto_suspend_enabled = true;
        lic.grace_period_days = grace_days;
        let id = store.insert(lic, None).unwrap();
        let engine = PolicyEngine::new(store.clone(), Arc::new(LoggingNotifier));

        let report = engine.run_pass(at(2026, 6, 10));
        assert_eq!(
            report.suspended,
            usize::from(expect_suspended),
            "grace_period_days={grace_days}"
        );
        assert_eq!(
            store.get(id).unwrap().suspended_at.is_some(),
            expect_suspended
        );
    }
}

#[test]
fn auto_suspend_disabled_license_is_never_suspended() {
    let store = LicenseStore::new();
    let lic = active_license("LIC-OFF", at(2026, 1, 1));
    let id = store.insert(lic, None).unwrap();
    let engine = PolicyEngine::new(store.clone(), Arc::new(LoggingNotifier));

    let report = engine.run_pass(at(2026, 6, 1));
    assert_eq!(report.suspended, 0);
    // Expiry marking still happens.
    assert_eq!(store.get(id).unwrap().status, LicenseStatus::Expired);
}

#[test]
fn renewal_after_suspension_clears_the_bookkeeping() {
    let store = LicenseStore::new();
    let mut lic = active_license("LIC-REN", at(2026, 5, 1));
    lic.auto_suspend_enabled = true;
    lic.grace_period_days = 10;
    let id = store.insert(lic, None).unwrap();
    let engine = PolicyEngine::new(store.clone(), Arc::new(LoggingNotifier));

    engine.run_pass(at(2026, 5, 20));
    let suspended = store.get(id).unwrap();
    assert_eq!(suspended.status, LicenseStatus::Expired);
    assert!(suspended.suspended_at.is_some());

    // The customer renews: expiry extended, license reactivated.
    store
        .try_update::<_, lms_core::RuleViolation>(id, |lic| {
            lic.expires_at = Some(at(2027, 5, 1));
            lic.transition(
                TransitionContext::system(LicenseStatus::Active, at(2026, 5, 25)).renewal(),
            )?;
            Ok(())
        })
        .unwrap()
        .unwrap();

    let renewed = store.get(id).unwrap();
    assert_eq!(renewed.status, LicenseStatus::Active);
    assert!(renewed.suspended_at.is_none());
    assert!(renewed.suspension_reason.is_none());
    assert!(renewed.reactivated_at.is_some());
    assert!(renewed.renewal_reminders_sent.is_empty());

    // The next pass starts the reminder cycle afresh.
    let notifierless = engine.run_pass(at(2026, 5, 26));
    assert_eq!(notifierless.reminders_sent, 0);
}

#[test]
fn policy_actions_append_audit_events() {
    let store = LicenseStore::new();
    let mut lic = active_license("LIC-AUD", at(2026, 5, 1));
    lic.auto_suspend_enabled = true;
    lic.grace_period_days = 5;
    let id = store.insert(lic, None).unwrap();
    let engine = PolicyEngine::new(store.clone(), Arc::new(LoggingNotifier));

    engine.run_pass(at(2026, 6, 1));
    let events = store.audit().for_entity("license", &id.to_string());
    assert!(events.iter().any(|e| e.event_type == "license.status_changed"));
    assert!(events.iter().any(|e| e.event_type == "license.auto_suspended"));
    assert!(store.audit().verify_chain().chain_valid);
}
