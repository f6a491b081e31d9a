//! Pure policy evaluation.
//!
//! `evaluate` maps one license and a clock to the list of actions the
//! pass should take. It reads nothing but the license and performs no
//! side effects; the engine owns applying the actions.

use chrono::{DateTime, Utc};

use lms_core::ReminderWindow;
use lms_state::{License, LicenseStatus};

/// One action the policy pass wants taken on a license.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyAction {
    /// Hand a renewal reminder request to the notifier and record the
    /// window as sent.
    SendReminder {
        /// Which reminder band fired.
        window: ReminderWindow,
    },
    /// Move an active license to `expiring`.
    MarkExpiring,
    /// Move a license past its expiry date to `expired`.
    MarkExpired,
    /// Grace period exhausted on an auto-suspend license.
    Suspend {
        /// Human-readable suspension reason.
        reason: String,
    },
}

/// Evaluate one license. Ordering matters: reminders are decided on the
/// status the license woke up with, before any expiry marking.
pub fn evaluate(license: &License, now: DateTime<Utc>) -> Vec<PolicyAction> {
    let mut actions = Vec::new();

    // Reminders: fire-once per window, only while the license is usable.
    if license.is_active() {
        if let Some(days) = license.days_until_expiry(now) {
            if let Some(window) = ReminderWindow::for_days_until_expiry(days) {
                if !license.renewal_reminders_sent.contains(&window) {
                    actions.push(PolicyAction::SendReminder { window });
                }
            }
        }
    }

    // Expiry marking.
    if license.status == LicenseStatus::Active && license.is_expiring_soon(now, 30) {
        actions.push(PolicyAction::MarkExpiring);
    }
    if license.is_expired(now)
        && !matches!(
            license.status,
            LicenseStatus::Expired | LicenseStatus::Revoked | LicenseStatus::Cancel
        )
    {
        actions.push(PolicyAction::MarkExpired);
    }

    // Auto-suspension, once per suspension.
    if license.should_be_suspended(now) && license.suspended_at.is_none() {
        actions.push(PolicyAction::Suspend {
            reason: format!(
                "grace period of {} day(s) exhausted after expiry",
                license.grace_period_days
            ),
        });
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lms_state::TransitionContext;

    fn at(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 9, 0, 0).unwrap()
    }

    fn active(expires: DateTime<Utc>) -> License {
        let mut lic = License::new("LIC-EV", "Acme", "messaging", "pro");
        lic.expires_at = Some(expires);
        lic.transition(TransitionContext::system(LicenseStatus::Active, at(2026, 1, 1)))
            .unwrap();
        lic
    }

    #[test]
    fn reminder_bands_map_to_windows() {
        let lic = active(at(2026, 6, 30));
        let cases = [
            (at(2026, 6, 29), ReminderWindow::OneDay),
            (at(2026, 6, 25), ReminderWindow::SevenDay),
            (at(2026, 6, 10), ReminderWindow::ThirtyDay),
        ];
        for (now, window) in cases {
            let actions = evaluate(&lic, now);
            assert!(
                actions.contains(&PolicyAction::SendReminder { window }),
                "at {now} expected {window:?}"
            );
        }

        // Far out: no reminder at all.
        let far = evaluate(&lic, at(2026, 1, 15));
        assert!(!far
            .iter()
            .any(|a| matches!(a, PolicyAction::SendReminder { .. })));
    }

    #[test]
    fn sent_window_does_not_refire() {
        let mut lic = active(at(2026, 6, 30));
        lic.renewal_reminders_sent.insert(ReminderWindow::SevenDay);
        let actions = evaluate(&lic, at(2026, 6, 25));
        assert!(!actions
            .iter()
            .any(|a| matches!(a, PolicyAction::SendReminder { .. })));
    }

    #[test]
    fn grace_period_gates_suspension() {
        // Expired 40 days ago, 30-day grace, auto-suspend on.
        let mut lic = active(at(2026, 1, 1));
        lic.auto_suspend_enabled = true;
        lic.grace_period_days = 30;
        let now = at(2026, 2, 10);
        assert!(lic.should_be_suspended(now));
        assert!(evaluate(&lic, now)
            .iter()
            .any(|a| matches!(a, PolicyAction::Suspend { .. })));

        // Same license with a 45-day grace: still inside it.
        lic.grace_period_days = 45;
        assert!(!lic.should_be_suspended(now));
        assert!(!evaluate(&lic, now)
            .iter()
            .any(|a| matches!(a, PolicyAction::Suspend { .. })));
    }

    #[test]
    fn already_suspended_license_is_left_alone() {
        let mut lic = active(at(2026, 1, 1));
        lic.auto_suspend_enabled = true;
        lic.suspended_at = Some(at(2026, 2, 5));
        let actions = evaluate(&lic, at(2026, 3, 1));
        assert!(!actions
            .iter()
            .any(|a| matches!(a, PolicyAction::Suspend { .. })));
    }

    #[test]
    fn expired_draft_is_flagged_for_marking() {
        // The transition will fail at apply time (draft cannot expire),
        // surfacing the data oddity in the pass report.
        let mut lic = License::new("LIC-DR", "Acme", "messaging", "pro");
        lic.expires_at = Some(at(2026, 1, 1));
        let actions = evaluate(&lic, at(2026, 2, 1));
        assert!(actions.contains(&PolicyAction::MarkExpired));
    }
}
