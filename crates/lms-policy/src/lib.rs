//! # lms-policy — lifecycle policy engine
//!
//! Evaluates every non-terminal license against the expiry, reminder,
//! and auto-suspension rules. Evaluation is a pure function from a
//! license and a clock to a list of [`PolicyAction`]s — no store
//! access, no notifier calls — so the whole rule set is testable
//! without machinery. The engine then applies each license's actions as
//! its own atomic unit; no lock is held across the full pass, and a
//! notifier failure is logged, never raised.

pub mod evaluate;
pub mod notify;

pub use evaluate::{evaluate, PolicyAction};
pub use notify::{LoggingNotifier, Notifier, NotifyError};

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;

use lms_core::{LicenseId, LmsError, ReminderWindow};
use lms_state::{LicenseStatus, TransitionContext};
use lms_store::LicenseStore;

/// Outcome totals for one policy pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyReport {
    /// Non-terminal licenses examined.
    pub evaluated: usize,
    /// Reminder requests handed to the notifier.
    pub reminders_sent: usize,
    /// Licenses moved to `expiring`.
    pub marked_expiring: usize,
    /// Licenses moved to `expired`.
    pub marked_expired: usize,
    /// Licenses auto-suspended.
    pub suspended: usize,
    /// Per-license failures; the pass continued past each.
    pub failures: Vec<(LicenseId, String)>,
}

/// Applies policy actions to the store, one license at a time.
pub struct PolicyEngine {
    store: LicenseStore,
    notifier: Arc<dyn Notifier>,
}

impl PolicyEngine {
    /// Create an engine over a store and a notification collaborator.
    pub fn new(store: LicenseStore, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Evaluate and apply policy for every non-terminal license.
    pub fn run_pass(&self, now: DateTime<Utc>) -> PolicyReport {
        let mut report = PolicyReport::default();

        for license in self.store.non_terminal() {
            report.evaluated += 1;
            for action in evaluate(&license, now) {
                if let Err(e) = self.apply(license.id, &action, now, &mut report) {
                    tracing::warn!(license = %license.id, error = %e, "policy action failed");
                    report.failures.push((license.id, e.to_string()));
                }
            }
        }

        tracing::info!(
            evaluated = report.evaluated,
            reminders = report.reminders_sent,
            expiring = report.marked_expiring,
            expired = report.marked_expired,
            suspended = report.suspended,
            failures = report.failures.len(),
            "policy pass finished"
        );
        report
    }

    fn apply(
        &self,
        id: LicenseId,
        action: &PolicyAction,
        now: DateTime<Utc>,
        report: &mut PolicyReport,
    ) -> Result<(), LmsError> {
        match action {
            PolicyAction::SendReminder { window } => {
                self.send_reminder(id, *window, now)?;
                report.reminders_sent += 1;
            }
            PolicyAction::MarkExpiring => {
                self.store.transition(
                    id,
                    TransitionContext::system(LicenseStatus::Expiring, now)
                        .with_reason("expiry within 30 days"),
                )?;
                report.marked_expiring += 1;
            }
            PolicyAction::MarkExpired => {
                self.store.transition(
                    id,
                    TransitionContext::system(LicenseStatus::Expired, now)
                        .with_reason("expiry date passed"),
                )?;
                report.marked_expired += 1;
            }
            PolicyAction::Suspend { reason } => {
                self.suspend(id, reason, now)?;
                report.suspended += 1;
            }
        }
        Ok(())
    }

    /// Record the reminder and hand the request to the notifier.
    ///
    /// The window is marked sent before the notifier runs: delivery
    /// retries belong to the notification collaborator, and a flaky
    /// notifier must not turn fire-once into fire-every-pass.
    fn send_reminder(
        &self,
        id: LicenseId,
        window: ReminderWindow,
        now: DateTime<Utc>,
    ) -> Result<(), LmsError> {
        let license = self
            .store
            .try_update::<_, LmsError>(id, |lic| {
                lic.renewal_reminders_sent.insert(window);
                lic.last_renewal_reminder = Some(now);
                lic.record_action(
                    "reminder_sent",
                    None,
                    Some(format!("{} renewal reminder", window.as_str())),
                    now,
                );
                Ok(lic.clone())
            })
            .ok_or_else(|| LmsError::NotFound(format!("license {id}")))??;

        self.store.audit().append(
            "license.reminder_sent",
            None,
            id.to_string(),
            "license",
            json!({"window": window.as_str()}),
        );

        if let Err(e) = self.notifier.send_reminder(&license, window) {
            tracing::warn!(license = %id, window = window.as_str(), error = %e,
                "reminder notification failed");
        }
        Ok(())
    }

    fn suspend(&self, id: LicenseId, reason: &str, now: DateTime<Utc>) -> Result<(), LmsError> {
        // Grace period exhausted: the license lands in `expired` if the
        // table still allows it, then the suspension fields are set.
        let needs_transition = self
            .store
            .get(id)
            .ok_or_else(|| LmsError::NotFound(format!("license {id}")))?
            .status
            != LicenseStatus::Expired;
        if needs_transition {
            self.store.transition(
                id,
                TransitionContext::system(LicenseStatus::Expired, now)
                    .with_reason(reason.to_string()),
            )?;
        }

        self.store
            .try_update::<_, LmsError>(id, |lic| {
                lic.suspended_at = Some(now);
                lic.suspension_reason = Some(reason.to_string());
                lic.record_action("auto_suspended", None, Some(reason.to_string()), now);
                Ok(())
            })
            .ok_or_else(|| LmsError::NotFound(format!("license {id}")))??;

        self.store.audit().append(
            "license.auto_suspended",
            None,
            id.to_string(),
            "license",
            json!({"reason": reason}),
        );
        Ok(())
    }
}
