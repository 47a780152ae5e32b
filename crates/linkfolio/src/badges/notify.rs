use tracing::info;

use super::domain::AwardNotification;

/// Outbound hook towards the presentation layer (toasts, profile badges, e-mail).
pub trait AwardNotifier: Send + Sync {
    fn publish(&self, notification: AwardNotification) -> Result<(), NotifyError>;
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Default notifier: emits one structured log event per grant.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl AwardNotifier for TracingNotifier {
    fn publish(&self, notification: AwardNotification) -> Result<(), NotifyError> {
        info!(
            user = %notification.user_id,
            badge = %notification.badge_id,
            rarity = notification.rarity.label(),
            awarded_at = %notification.awarded_at,
            "badge awarded"
        );
        Ok(())
    }
}
