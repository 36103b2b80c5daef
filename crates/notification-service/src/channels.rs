use async_trait::async_trait;
use std::time::Duration;

use crate::{Alert, NotificationError};

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Writes alerts to the structured log. Always configured.
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        tracing::info!(
            instrument = %alert.instrument,
            direction = %alert.direction,
            confidence = %format!("{:.1}", alert.confidence),
            "ALERT {}",
            alert.title
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Discord webhook notifier.
pub struct DiscordWebhookChannel {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordWebhookChannel {
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let webhook_url = webhook_url.into();
        if !webhook_url.starts_with("http://") && !webhook_url.starts_with("https://") {
            return Err(NotificationError::Config(format!(
                "webhook url must be http(s), got '{}'",
                webhook_url
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Config(e.to_string()))?;
        Ok(Self { webhook_url, client })
    }

    /// Embed payload posted to the webhook.
    pub fn payload(alert: &Alert) -> serde_json::Value {
        serde_json::json!({
            "username": "Signal Agent",
            "embeds": [{
                "title": alert.title,
                "description": alert.message,
                "color": alert.color(),
                "timestamp": alert.timestamp.to_rfc3339(),
            }]
        })
    }
}

#[async_trait]
impl NotificationChannel for DiscordWebhookChannel {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&Self::payload(alert))
            .send()
            .await
            .map_err(|e| NotificationError::Discord(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Discord(format!("HTTP {}: {}", status, body)));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }
}
