//! Notification collaborator port (spec §4.F "Events").

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSeverity {
    Info,
    Warning,
    Error,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, kind: &str, title: &str, message: &str, severity: NotificationSeverity, fields: Value);
}

/// No-op notifier used where no outbound collaborator is configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, kind: &str, title: &str, _message: &str, _severity: NotificationSeverity, _fields: Value) {
        tracing::debug!(kind, title, "notification dropped: no notifier configured");
    }
}
