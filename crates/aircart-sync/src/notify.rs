//! The notification sink the synchronizer reports outcomes through.

/// How a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Info,
}

/// Fire-and-forget channel to whatever surfaces messages to the user
/// (a toast bar, an alert region). Implementations must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// Default sink for headless use: routes notifications to the log.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Error => tracing::error!(%message, "cart notification"),
            Severity::Success | Severity::Info => {
                tracing::info!(?severity, %message, "cart notification");
            }
        }
    }
}
