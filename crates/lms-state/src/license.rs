//! # License Entity and Status State Machine
//!
//! Models the lifecycle of a software license from draft through
//! expiry, revocation, or cancellation.
//!
//! ## Statuses
//!
//! ```text
//! Draft ──▶ Active ──▶ Expiring ──▶ Expired ──▶ Revoked (terminal)
//!   │         │  ▲        │            │
//!   │         │  └────────┘            └──▶ Active (renewal)
//!   │         └──▶ Cancel ──▶ Active
//!   └──▶ Cancel
//! Pending ──▶ Active | Draft | Cancel
//! ```
//!
//! ## Transition Checking
//!
//! A requested transition is checked in two stages:
//!
//! 1. **Table check** — the (from, to) pair must appear in
//!    [`LicenseStatus::valid_targets`]. Requests outside the table fail
//!    with [`RuleViolation::InvalidTransition`] before any semantic check.
//! 2. **Semantic rules** — per-target conditions (expiry set for
//!    activation, renewal/force required when activating an expired
//!    license, and so on).
//!
//! Revocation and cancellation are structurally unconditional but emit
//! [`TransitionWarning`]s — warnings accompany success, never block it.
//!
//! Every successful transition appends a [`RenewalEntry`] to the
//! license's ordered history. The matching audit event is appended by
//! the repository layer, which owns the audit log.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use lms_core::{days_until, LicenseId, ReminderWindow, RuleViolation, SyncStatus, UserId};

// ─── License Status ─────────────────────────────────────────────────

/// The lifecycle status of a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// Created but not yet activated.
    Draft,
    /// Valid and in use.
    Active,
    /// Active, with expiry inside the warning horizon.
    Expiring,
    /// Past its expiry date.
    Expired,
    /// Permanently revoked (terminal).
    Revoked,
    /// Cancelled; may be reactivated.
    Cancel,
    /// Awaiting first activation (e.g. created from an external match).
    Pending,
}

impl LicenseStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Expiring => "expiring",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Cancel => "cancel",
            Self::Pending => "pending",
        }
    }

    /// Convert a canonical status name to a `LicenseStatus`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "expiring" => Some(Self::Expiring),
            "expired" => Some(Self::Expired),
            "revoked" => Some(Self::Revoked),
            "cancel" => Some(Self::Cancel),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked)
    }

    /// Return the set of valid target statuses from this status.
    pub fn valid_targets(&self) -> &'static [LicenseStatus] {
        match self {
            Self::Draft => &[Self::Active, Self::Cancel],
            Self::Active => &[Self::Expiring, Self::Expired, Self::Revoked, Self::Cancel],
            Self::Expiring => &[Self::Active, Self::Expired, Self::Revoked, Self::Cancel],
            Self::Expired => &[Self::Active, Self::Revoked],
            Self::Revoked => &[],
            Self::Cancel => &[Self::Active],
            Self::Pending => &[Self::Active, Self::Draft, Self::Cancel],
        }
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Transition Context and Outcome ─────────────────────────────────

/// Caller-supplied context for a status transition request.
#[derive(Debug, Clone)]
pub struct TransitionContext {
    /// The requested target status.
    pub to: LicenseStatus,
    /// Who requested the transition; `None` for system-initiated ones.
    pub actor: Option<UserId>,
    /// Reason for the transition.
    pub reason: Option<String>,
    /// The transition is part of a renewal (permits activating an
    /// expired license).
    pub renewal: bool,
    /// Administrative override of the expired-activation rule.
    pub force: bool,
    /// The instant the transition is evaluated at.
    pub now: DateTime<Utc>,
}

impl TransitionContext {
    /// A system-initiated transition with no actor and no reason.
    pub fn system(to: LicenseStatus, now: DateTime<Utc>) -> Self {
        Self {
            to,
            actor: None,
            reason: None,
            renewal: false,
            force: false,
            now,
        }
    }

    /// A user-initiated transition.
    pub fn by(to: LicenseStatus, actor: UserId, now: DateTime<Utc>) -> Self {
        Self {
            actor: Some(actor),
            ..Self::system(to, now)
        }
    }

    /// Attach a reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Mark the transition as a renewal.
    pub fn renewal(mut self) -> Self {
        self.renewal = true;
        self
    }

    /// Mark the transition as forced.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }
}

/// A non-blocking problem noticed during a successful transition.
///
/// Returned as structured data alongside the result — not only logged —
/// so callers can surface or act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionWarning {
    /// An active license is being revoked.
    RevokingActive,
    /// An active license is being cancelled.
    CancellingActive,
    /// No reason was supplied for a revoke or cancel.
    NoReasonSupplied,
}

impl TransitionWarning {
    /// Human-readable warning text.
    pub fn message(&self) -> &'static str {
        match self {
            Self::RevokingActive => "revoking a license that is currently active",
            Self::CancellingActive => "cancelling a license that is currently active",
            Self::NoReasonSupplied => "no reason supplied for revoke/cancel",
        }
    }
}

impl std::fmt::Display for TransitionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// The result of a successful transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// Status before the transition.
    pub from: LicenseStatus,
    /// Status after the transition.
    pub to: LicenseStatus,
    /// Warnings that accompanied the success.
    pub warnings: Vec<TransitionWarning>,
}

/// One entry in a license's ordered renewal/lifecycle history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalEntry {
    /// What happened: `"status_changed"`, `"reminder_sent"`,
    /// `"auto_suspended"`.
    pub action: String,
    /// Status before the action, if it was a status change.
    pub from_status: Option<LicenseStatus>,
    /// Status after the action, if it was a status change.
    pub to_status: Option<LicenseStatus>,
    /// When the action occurred.
    pub timestamp: DateTime<Utc>,
    /// Who performed the action; `None` for system actions.
    pub actor: Option<UserId>,
    /// Reason supplied with the action.
    pub reason: Option<String>,
    /// Whether the action carried an administrative override.
    pub force: bool,
}

// ─── License ────────────────────────────────────────────────────────

/// A provisioned grant of product access with a seat capacity and a
/// validity window.
///
/// This is a value object: it has no persistence awareness. `seats_used`
/// is derived from the assignment ledger and written back by the
/// repository — callers never set it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    /// Unique internal identifier.
    pub id: LicenseId,
    /// Unique license key.
    pub key: String,

    // Commercial attributes.
    /// Doing-business-as name of the license holder.
    pub dba: String,
    /// Product the license grants access to.
    pub product: String,
    /// Commercial plan.
    pub plan: String,
    /// Billing term, e.g. `"monthly"`, `"annual"`.
    pub term: Option<String>,
    /// Seat capacity.
    pub seats_total: u32,
    /// Seats currently assigned. Derived; maintained by the repository.
    pub seats_used: u32,

    // Temporal attributes.
    /// Start of the validity window.
    pub starts_at: Option<DateTime<Utc>>,
    /// End of the validity window.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the license was cancelled.
    pub cancel_date: Option<DateTime<Utc>>,
    /// Last observed activity on the license.
    pub last_active: Option<DateTime<Utc>>,

    // Lifecycle bookkeeping.
    /// Current lifecycle status.
    pub status: LicenseStatus,
    /// Reminder windows already fired for the current expiry.
    pub renewal_reminders_sent: BTreeSet<ReminderWindow>,
    /// When the most recent reminder was fired.
    pub last_renewal_reminder: Option<DateTime<Utc>>,
    /// When renewal is due.
    pub renewal_due_date: Option<DateTime<Utc>>,
    /// Whether the policy engine may auto-suspend after the grace period.
    pub auto_suspend_enabled: bool,
    /// Days after expiry during which the license remains usable.
    pub grace_period_days: i64,
    /// Why the license was suspended.
    pub suspension_reason: Option<String>,
    /// When the license was suspended.
    pub suspended_at: Option<DateTime<Utc>>,
    /// When the license was last reactivated.
    pub reactivated_at: Option<DateTime<Utc>>,
    /// Ordered log of lifecycle actions.
    pub renewal_history: Vec<RenewalEntry>,

    // External linkage.
    /// Provider application identifier (primary match key).
    pub appid: Option<String>,
    /// Provider account identifier (secondary match key).
    pub countid: Option<String>,
    /// Provider merchant identifier.
    pub mid: Option<String>,
    /// Provider license type.
    pub license_type: Option<String>,
    /// Monthly fee reported by the provider.
    pub monthly_fee: Option<f64>,
    /// Remaining SMS credits. The stored, reconciled value is
    /// authoritative — there is no computed shadow of this field.
    pub sms_balance: Option<f64>,
    /// Licensed email address (tertiary match key).
    pub email_license: Option<String>,
    /// Provider package data.
    pub package: Option<String>,
    /// Provider workspace identifier.
    pub workspace: Option<String>,
    /// Provider "coming expired" flag.
    pub coming_expired: Option<bool>,
    /// Free-form provider note.
    pub note: Option<String>,
    /// Postal code from the provider.
    pub zip: Option<String>,
    /// Outcome of the most recent reconciliation touching this license.
    pub external_sync_status: SyncStatus,
    /// When the license was last touched by reconciliation.
    pub last_external_sync: Option<DateTime<Utc>>,
    /// Captured error from the last failed reconciliation.
    pub external_sync_error: Option<String>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}

impl License {
    /// Create a new draft license with default bookkeeping.
    pub fn new(
        key: impl Into<String>,
        dba: impl Into<String>,
        product: impl Into<String>,
        plan: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: LicenseId::new(),
            key: key.into(),
            dba: dba.into(),
            product: product.into(),
            plan: plan.into(),
            term: None,
            seats_total: 1,
            seats_used: 0,
            starts_at: None,
            expires_at: None,
            cancel_date: None,
            last_active: None,
            status: LicenseStatus::Draft,
            renewal_reminders_sent: BTreeSet::new(),
            last_renewal_reminder: None,
            renewal_due_date: None,
            auto_suspend_enabled: false,
            grace_period_days: 30,
            suspension_reason: None,
            suspended_at: None,
            reactivated_at: None,
            renewal_history: Vec::new(),
            appid: None,
            countid: None,
            mid: None,
            license_type: None,
            monthly_fee: None,
            sms_balance: None,
            email_license: None,
            package: None,
            workspace: None,
            coming_expired: None,
            note: None,
            zip: None,
            external_sync_status: SyncStatus::Pending,
            last_external_sync: None,
            external_sync_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    // ── Derived predicates ──────────────────────────────────────────

    /// Whether the expiry date is set and in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|e| e < now)
    }

    /// Whether expiry is strictly within the next `days` days.
    pub fn is_expiring_soon(&self, now: DateTime<Utc>, days: i64) -> bool {
        match self.days_until_expiry(now) {
            Some(d) => d > 0 && d <= days,
            None => false,
        }
    }

    /// Whole days until expiry, by calendar date. Negative once expired.
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|e| days_until(e, now))
    }

    /// End of the grace period: `expires_at + grace_period_days`.
    ///
    /// Always re-derived from those two fields — never stored, so it
    /// cannot drift.
    pub fn grace_period_end(&self) -> Option<DateTime<Utc>> {
        self.expires_at.map(|e| e + Duration::days(self.grace_period_days))
    }

    /// Whether the license is expired but still inside its grace period.
    pub fn is_in_grace_period(&self, now: DateTime<Utc>) -> bool {
        self.is_expired(now) && self.grace_period_end().is_some_and(|end| now <= end)
    }

    /// Whether the license meets the auto-suspension policy.
    pub fn should_be_suspended(&self, now: DateTime<Utc>) -> bool {
        self.auto_suspend_enabled
            && self.is_expired(now)
            && !self.is_in_grace_period(now)
            && !matches!(self.status, LicenseStatus::Revoked | LicenseStatus::Cancel)
    }

    /// Seat utilization as a percentage of capacity.
    pub fn utilization_percent(&self) -> f64 {
        if self.seats_total == 0 {
            return 0.0;
        }
        f64::from(self.seats_used) / f64::from(self.seats_total) * 100.0
    }

    /// Whether at least one seat is free.
    pub fn has_available_seats(&self) -> bool {
        self.seats_used < self.seats_total
    }

    /// Whether the license is currently usable.
    pub fn is_active(&self) -> bool {
        matches!(self.status, LicenseStatus::Active | LicenseStatus::Expiring)
    }

    /// Whether a new seat may be assigned right now.
    pub fn can_assign(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.has_available_seats() && !self.is_expired(now)
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// Request a status transition.
    ///
    /// Checks the transition table first, then the per-target semantic
    /// rules. On success the status is updated, side fields are
    /// maintained, and a [`RenewalEntry`] is appended; the outcome
    /// carries any non-blocking warnings.
    pub fn transition(
        &mut self,
        ctx: TransitionContext,
    ) -> Result<TransitionOutcome, RuleViolation> {
        let from = self.status;

        if from.is_terminal() {
            return Err(RuleViolation::TerminalStatus {
                license: self.id,
                status: from.to_string(),
            });
        }
        if !from.valid_targets().contains(&ctx.to) {
            return Err(RuleViolation::InvalidTransition {
                from: from.to_string(),
                to: ctx.to.to_string(),
            });
        }

        let warnings = self.check_semantics(&ctx, from)?;
        self.apply_transition(&ctx, from);

        Ok(TransitionOutcome {
            from,
            to: ctx.to,
            warnings,
        })
    }

    /// Per-target semantic rules. Returns the warnings to attach on
    /// success.
    fn check_semantics(
        &self,
        ctx: &TransitionContext,
        from: LicenseStatus,
    ) -> Result<Vec<TransitionWarning>, RuleViolation> {
        let mut warnings = Vec::new();
        match ctx.to {
            LicenseStatus::Active => {
                if self.expires_at.is_none() {
                    return Err(RuleViolation::MissingExpiry {
                        target: ctx.to.to_string(),
                    });
                }
                if self.is_expired(ctx.now) && !ctx.renewal && !ctx.force {
                    return Err(RuleViolation::ExpiredActivation { license: self.id });
                }
            }
            LicenseStatus::Expired => {
                if self.expires_at.is_none() {
                    return Err(RuleViolation::MissingExpiry {
                        target: ctx.to.to_string(),
                    });
                }
            }
            LicenseStatus::Revoked | LicenseStatus::Cancel => {
                if from == LicenseStatus::Active {
                    warnings.push(if ctx.to == LicenseStatus::Revoked {
                        TransitionWarning::RevokingActive
                    } else {
                        TransitionWarning::CancellingActive
                    });
                }
                if ctx.reason.is_none() {
                    warnings.push(TransitionWarning::NoReasonSupplied);
                }
            }
            _ => {}
        }
        Ok(warnings)
    }

    /// Apply the status change and maintain side fields.
    fn apply_transition(&mut self, ctx: &TransitionContext, from: LicenseStatus) {
        self.status = ctx.to;
        self.updated_at = ctx.now;

        match ctx.to {
            LicenseStatus::Active => {
                if matches!(from, LicenseStatus::Expired | LicenseStatus::Cancel) {
                    self.reactivated_at = Some(ctx.now);
                    self.suspension_reason = None;
                    self.suspended_at = None;
                    // A renewal restarts the reminder cycle for the new expiry.
                    self.renewal_reminders_sent.clear();
                }
            }
            LicenseStatus::Cancel => {
                if self.cancel_date.is_none() {
                    self.cancel_date = Some(ctx.now);
                }
            }
            _ => {}
        }

        self.renewal_history.push(RenewalEntry {
            action: "status_changed".to_string(),
            from_status: Some(from),
            to_status: Some(ctx.to),
            timestamp: ctx.now,
            actor: ctx.actor,
            reason: ctx.reason.clone(),
            force: ctx.force,
        });
    }

    /// Record a non-transition lifecycle action in the history.
    pub fn record_action(
        &mut self,
        action: &str,
        actor: Option<UserId>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.renewal_history.push(RenewalEntry {
            action: action.to_string(),
            from_status: None,
            to_status: None,
            timestamp: now,
            actor,
            reason,
            force: false,
        });
        self.updated_at = now;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
