//! In-memory license repository.
//!
//! Thread-safe, cloneable store over `parking_lot` locks. All operations
//! are synchronous — no lock is ever held across an `.await` point, and
//! `parking_lot` locks are non-poisonable, so a panicking writer does
//! not permanently corrupt the store.
//!
//! Licenses and the assignment ledger live behind **one** write lock:
//! the seat-count recomputation runs in the same critical section as the
//! assignment write it accompanies, which is what makes the
//! `0 ≤ seats_used ≤ seats_total` invariant immune to interleaving.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::json;

use lms_core::{AssignmentId, LicenseId, LmsError, RuleViolation, SyncStatus, UserId};
use lms_state::{
    Assignment, AssignmentStatus, License, LicenseStatus, TransitionContext, TransitionOutcome,
};

use crate::audit::AuditLog;
use crate::query::LicenseFilter;
use crate::snapshot::ExternalLicenseSnapshot;

#[derive(Debug, Default)]
struct Inner {
    licenses: HashMap<LicenseId, License>,
    by_key: HashMap<String, LicenseId>,
    assignments: HashMap<AssignmentId, Assignment>,
}

impl Inner {
    /// Recompute `seats_used` from the ledger. Must be called inside the
    /// same write-lock section as the assignment mutation it follows.
    fn recount_seats(&mut self, license_id: LicenseId) {
        let used = self
            .assignments
            .values()
            .filter(|a| a.license_id == license_id && a.is_active())
            .count() as u32;
        if let Some(license) = self.licenses.get_mut(&license_id) {
            license.seats_used = used;
        }
    }

    fn non_revoked_for(&self, license_id: LicenseId, user_id: UserId) -> bool {
        self.assignments
            .values()
            .any(|a| a.license_id == license_id && a.user_id == user_id && a.is_non_revoked())
    }

    fn active_count(&self, license_id: LicenseId) -> usize {
        self.assignments
            .values()
            .filter(|a| a.license_id == license_id && a.is_active())
            .count()
    }
}

/// The authoritative in-memory repository: licenses, assignment ledger,
/// audit log, and staged provider snapshots.
///
/// Cloning shares the underlying data.
#[derive(Debug, Clone, Default)]
pub struct LicenseStore {
    inner: Arc<RwLock<Inner>>,
    audit: AuditLog,
    snapshots: Arc<RwLock<HashMap<String, ExternalLicenseSnapshot>>>,
}

impl LicenseStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from previously persisted rows.
    ///
    /// Unlike [`insert`](Self::insert), hydration records no audit
    /// events — the events for these rows were written when the
    /// mutations originally happened.
    pub fn hydrate(
        licenses: Vec<License>,
        assignments: Vec<Assignment>,
        snapshots: Vec<ExternalLicenseSnapshot>,
    ) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write();
            for license in licenses {
                inner.by_key.insert(license.key.clone(), license.id);
                inner.licenses.insert(license.id, license);
            }
            for assignment in assignments {
                inner.assignments.insert(assignment.id, assignment);
            }
            let ids: Vec<LicenseId> = inner.licenses.keys().copied().collect();
            for id in ids {
                inner.recount_seats(id);
            }
        }
        {
            let mut staged = store.snapshots.write();
            for snapshot in snapshots {
                staged.insert(snapshot.external_id.clone(), snapshot);
            }
        }
        store
    }

    // ── License CRUD ────────────────────────────────────────────────

    /// Insert a new license. The key must be unique.
    pub fn insert(&self, license: License, actor: Option<UserId>) -> Result<LicenseId, LmsError> {
        let id = license.id;
        {
            let mut inner = self.inner.write();
            if inner.licenses.contains_key(&id) {
                return Err(LmsError::DataIntegrity(format!("duplicate license id {id}")));
            }
            if inner.by_key.contains_key(&license.key) {
                return Err(LmsError::DataIntegrity(format!(
                    "duplicate license key {:?}",
                    license.key
                )));
            }
            inner.by_key.insert(license.key.clone(), id);
            inner.licenses.insert(id, license);
        }
        self.audit.append(
            "license.created",
            actor,
            id.to_string(),
            "license",
            json!({}),
        );
        Ok(id)
    }

    /// Fetch a license by id.
    pub fn get(&self, id: LicenseId) -> Option<License> {
        self.inner.read().licenses.get(&id).cloned()
    }

    /// Fetch a license by key.
    pub fn get_by_key(&self, key: &str) -> Option<License> {
        let inner = self.inner.read();
        let id = inner.by_key.get(key)?;
        inner.licenses.get(id).cloned()
    }

    /// Find the license linked to a provider appid.
    pub fn find_by_appid(&self, appid: &str) -> Option<License> {
        self.inner
            .read()
            .licenses
            .values()
            .find(|l| l.appid.as_deref() == Some(appid))
            .cloned()
    }

    /// Find the license linked to a provider countid.
    pub fn find_by_countid(&self, countid: &str) -> Option<License> {
        self.inner
            .read()
            .licenses
            .values()
            .find(|l| l.countid.as_deref() == Some(countid))
            .cloned()
    }

    /// Find the license with a given licensed email.
    pub fn find_by_email(&self, email: &str) -> Option<License> {
        self.inner
            .read()
            .licenses
            .values()
            .find(|l| l.email_license.as_deref() == Some(email))
            .cloned()
    }

    /// Atomically read-validate-update a license.
    ///
    /// The closure runs under the write lock; the whole operation is one
    /// critical section, eliminating TOCTOU races between read and
    /// update. Returns `None` if the license does not exist.
    pub fn try_update<R, E>(
        &self,
        id: LicenseId,
        f: impl FnOnce(&mut License) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.inner.write().licenses.get_mut(&id).map(f)
    }

    /// List licenses matching a filter, newest first, with pagination.
    pub fn list(
        &self,
        filter: &LicenseFilter,
        now: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> Vec<License> {
        let inner = self.inner.read();
        let mut matched: Vec<&License> = inner
            .licenses
            .values()
            .filter(|l| filter.matches(l, now))
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        matched.into_iter().skip(offset).take(limit).cloned().collect()
    }

    /// Count licenses matching a filter.
    pub fn count(&self, filter: &LicenseFilter, now: DateTime<Utc>) -> usize {
        self.inner
            .read()
            .licenses
            .values()
            .filter(|l| filter.matches(l, now))
            .count()
    }

    /// Every license, in no particular order.
    pub fn all_licenses(&self) -> Vec<License> {
        self.inner.read().licenses.values().cloned().collect()
    }

    /// Every assignment, in no particular order.
    pub fn all_assignments(&self) -> Vec<Assignment> {
        self.inner.read().assignments.values().cloned().collect()
    }

    /// All licenses whose status is not terminal, for the policy pass.
    pub fn non_terminal(&self) -> Vec<License> {
        self.inner
            .read()
            .licenses
            .values()
            .filter(|l| !l.status.is_terminal())
            .cloned()
            .collect()
    }

    /// Number of licenses stored.
    pub fn len(&self) -> usize {
        self.inner.read().licenses.len()
    }

    /// Whether the store holds no licenses.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// Request a status transition and record the audit event.
    pub fn transition(
        &self,
        id: LicenseId,
        ctx: TransitionContext,
    ) -> Result<TransitionOutcome, LmsError> {
        let actor = ctx.actor;
        let reason = ctx.reason.clone();
        let outcome = self
            .try_update(id, |license| license.transition(ctx))
            .ok_or_else(|| LmsError::NotFound(format!("license {id}")))?
            .map_err(LmsError::Rule)?;

        for warning in &outcome.warnings {
            tracing::warn!(license = %id, warning = %warning, "transition warning");
        }
        self.audit.append(
            "license.status_changed",
            actor,
            id.to_string(),
            "license",
            json!({
                "from": outcome.from,
                "to": outcome.to,
                "reason": reason,
                "warnings": outcome.warnings,
            }),
        );
        Ok(outcome)
    }

    /// Transition many licenses, isolating per-item failures.
    pub fn bulk_transition(
        &self,
        ids: &[LicenseId],
        to: LicenseStatus,
        actor: Option<UserId>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Vec<(LicenseId, Result<TransitionOutcome, LmsError>)> {
        ids.iter()
            .map(|&id| {
                let mut ctx = TransitionContext::system(to, now);
                ctx.actor = actor;
                ctx.reason = reason.clone();
                (id, self.transition(id, ctx))
            })
            .collect()
    }

    /// Delete a license: a guarded status transition, never a row
    /// removal. Fails while active assignments remain.
    ///
    /// The assignment guard and the transition share one write lock, so
    /// a seat granted concurrently can never slip in between them.
    pub fn delete(
        &self,
        id: LicenseId,
        actor: Option<UserId>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, LmsError> {
        let outcome = {
            let mut inner = self.inner.write();
            let active = inner.active_count(id);
            let license = inner
                .licenses
                .get_mut(&id)
                .ok_or_else(|| LmsError::NotFound(format!("license {id}")))?;
            if active > 0 {
                return Err(RuleViolation::ActiveAssignmentsPresent {
                    license: id,
                    count: active,
                }
                .into());
            }
            // Revoked is the delete target where the table allows it;
            // draft/pending fall back to cancel.
            let target = if license.status.valid_targets().contains(&LicenseStatus::Revoked) {
                LicenseStatus::Revoked
            } else {
                LicenseStatus::Cancel
            };
            let mut ctx = TransitionContext::system(target, now);
            ctx.actor = actor;
            ctx.reason = reason.clone();
            license.transition(ctx).map_err(LmsError::Rule)?
        };

        for warning in &outcome.warnings {
            tracing::warn!(license = %id, warning = %warning, "transition warning");
        }
        self.audit.append(
            "license.status_changed",
            actor,
            id.to_string(),
            "license",
            json!({
                "from": outcome.from,
                "to": outcome.to,
                "reason": reason,
                "warnings": outcome.warnings,
            }),
        );
        self.audit.append(
            "license.deleted",
            actor,
            id.to_string(),
            "license",
            json!({"via_status": outcome.to}),
        );
        Ok(outcome)
    }

    // ── Assignment ledger ───────────────────────────────────────────

    /// Grant a seat to a user.
    ///
    /// Duplicate guard, assignability checks, the ledger write, and the
    /// seat recount all run under one write lock.
    pub fn assign(
        &self,
        license_id: LicenseId,
        user_id: UserId,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<Assignment, LmsError> {
        let assignment = {
            let mut inner = self.inner.write();
            let license = inner
                .licenses
                .get(&license_id)
                .ok_or_else(|| LmsError::NotFound(format!("license {license_id}")))?;

            if inner.non_revoked_for(license_id, user_id) {
                return Err(RuleViolation::DuplicateAssignment {
                    license: license_id,
                    user: user_id,
                }
                .into());
            }
            if !license.is_active() {
                return Err(RuleViolation::NotAssignable {
                    license: license_id,
                    reason: format!("status is {}", license.status),
                }
                .into());
            }
            if license.is_expired(now) {
                return Err(RuleViolation::NotAssignable {
                    license: license_id,
                    reason: "license is expired".to_string(),
                }
                .into());
            }
            if !license.has_available_seats() {
                return Err(RuleViolation::SeatLimitReached {
                    license: license_id,
                    seats_total: license.seats_total,
                }
                .into());
            }

            let assignment = Assignment::new(license_id, user_id, now);
            inner.assignments.insert(assignment.id, assignment.clone());
            inner.recount_seats(license_id);
            assignment
        };
        self.audit.append(
            "assignment.created",
            actor,
            assignment.id.to_string(),
            "assignment",
            json!({"license_id": license_id, "user_id": user_id}),
        );
        Ok(assignment)
    }

    /// Revoke a seat. Terminal for the row; the seat count is recounted
    /// in the same critical section.
    pub fn revoke_assignment(
        &self,
        id: AssignmentId,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<Assignment, LmsError> {
        self.close_assignment(id, actor, now, AssignmentStatus::Revoked)
    }

    /// Release a seat voluntarily.
    pub fn unassign(
        &self,
        id: AssignmentId,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<Assignment, LmsError> {
        self.close_assignment(id, actor, now, AssignmentStatus::Unassigned)
    }

    fn close_assignment(
        &self,
        id: AssignmentId,
        actor: Option<UserId>,
        now: DateTime<Utc>,
        to: AssignmentStatus,
    ) -> Result<Assignment, LmsError> {
        let assignment = {
            let mut inner = self.inner.write();
            let assignment = inner
                .assignments
                .get_mut(&id)
                .ok_or_else(|| LmsError::NotFound(format!("assignment {id}")))?;
            match to {
                AssignmentStatus::Revoked => assignment.revoke(now),
                _ => assignment.unassign(now),
            }
            .map_err(LmsError::Rule)?;
            let assignment = assignment.clone();
            inner.recount_seats(assignment.license_id);
            assignment
        };
        let event = match to {
            AssignmentStatus::Revoked => "assignment.revoked",
            _ => "assignment.unassigned",
        };
        self.audit.append(
            event,
            actor,
            assignment.id.to_string(),
            "assignment",
            json!({"license_id": assignment.license_id, "user_id": assignment.user_id}),
        );
        Ok(assignment)
    }

    /// All ledger rows for a license, oldest first.
    pub fn assignments_for(&self, license_id: LicenseId) -> Vec<Assignment> {
        let mut rows: Vec<Assignment> = self
            .inner
            .read()
            .assignments
            .values()
            .filter(|a| a.license_id == license_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.assigned_at);
        rows
    }

    // ── Audit ───────────────────────────────────────────────────────

    /// The audit log.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    // ── Snapshots ───────────────────────────────────────────────────

    /// Stage (or refresh) a provider snapshot.
    ///
    /// Returns `true` when the payload changed. An unchanged payload is
    /// left untouched, preserving its previous sync outcome.
    pub fn upsert_snapshot(
        &self,
        external_id: &str,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> bool {
        let mut snapshots = self.snapshots.write();
        match snapshots.get_mut(external_id) {
            Some(existing) if existing.payload == payload => false,
            Some(existing) => {
                existing.payload = payload;
                existing.fetched_at = now;
                existing.sync_status = SyncStatus::Pending;
                existing.sync_error = None;
                true
            }
            None => {
                snapshots.insert(
                    external_id.to_string(),
                    ExternalLicenseSnapshot::new(external_id, payload, now),
                );
                true
            }
        }
    }

    /// Mark a snapshot's sync outcome.
    pub fn mark_snapshot(
        &self,
        external_id: &str,
        status: SyncStatus,
        error: Option<String>,
        now: DateTime<Utc>,
    ) {
        let mut snapshots = self.snapshots.write();
        if let Some(snap) = snapshots.get_mut(external_id) {
            match status {
                SyncStatus::Synced => snap.mark_synced(now),
                SyncStatus::Failed => {
                    snap.mark_failed(error.unwrap_or_else(|| "unknown error".to_string()))
                }
                SyncStatus::Pending => {
                    snap.sync_status = SyncStatus::Pending;
                    snap.sync_error = None;
                }
            }
        }
    }

    /// Fetch a staged snapshot by external id.
    pub fn get_snapshot(&self, external_id: &str) -> Option<ExternalLicenseSnapshot> {
        self.snapshots.read().get(external_id).cloned()
    }

    /// All staged snapshots.
    pub fn snapshots(&self) -> Vec<ExternalLicenseSnapshot> {
        self.snapshots.read().values().cloned().collect()
    }
}
