//! Webhook notifier: the production `Notifier` implementation, posting
//! events as JSON to a configured URL (spec §4.F "Events").

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::domain::ports::{NotificationSeverity, Notifier};

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client with static config builds");
        Self { client, url }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, kind: &str, title: &str, message: &str, severity: NotificationSeverity, fields: Value) {
        let severity = match severity {
            NotificationSeverity::Info => "info",
            NotificationSeverity::Warning => "warning",
            NotificationSeverity::Error => "error",
        };
        let payload = json!({ "kind": kind, "title": title, "message": message, "severity": severity, "fields": fields });

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(kind, url = %self.url, "notification delivered");
            }
            Ok(response) => {
                tracing::warn!(kind, url = %self.url, status = %response.status(), "notification rejected");
            }
            Err(err) => {
                tracing::warn!(kind, url = %self.url, error = %err, "notification delivery failed");
            }
        }
    }
}
