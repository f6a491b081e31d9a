//! Notification collaborator seam.
//!
//! The policy engine only *requests* delivery; transport, templating,
//! and retries live behind this trait, outside the stack. The default
//! implementation just logs the request.

use thiserror::Error;

use lms_core::ReminderWindow;
use lms_state::License;

/// A failed delivery request. Reported, never propagated into the pass.
#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// The delivery collaborator the policy engine hands reminders to.
pub trait Notifier: Send + Sync {
    /// Request delivery of a renewal reminder.
    fn send_reminder(&self, license: &License, window: ReminderWindow) -> Result<(), NotifyError>;
}

/// A notifier that records the request in the log and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn send_reminder(&self, license: &License, window: ReminderWindow) -> Result<(), NotifyError> {
        tracing::info!(
            license = %license.id,
            key = %license.key,
            window = window.as_str(),
            email = license.email_license.as_deref().unwrap_or("<none>"),
            "renewal reminder requested"
        );
        Ok(())
    }
}
