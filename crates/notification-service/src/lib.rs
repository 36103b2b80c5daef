//! Alert delivery for high-confidence evaluations.

mod alert;
mod channels;

pub use alert::Alert;
pub use channels::{DiscordWebhookChannel, LogChannel, NotificationChannel};

use analysis_core::EvaluationRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Hands an evaluation to whoever needs to hear about it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, record: &EvaluationRecord) -> Result<(), NotificationError>;
}

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Discord webhook error: {0}")]
    Discord(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{failed} of {total} channels failed: {details}")]
    Partial {
        failed: usize,
        total: usize,
        details: String,
    },
}

/// Configuration for the notification service.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub discord_webhook_url: Option<String>,
    pub webhook_timeout: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            discord_webhook_url: None,
            webhook_timeout: Duration::from_secs(10),
        }
    }
}

/// Dispatches each alert to every configured channel in turn.
pub struct NotificationService {
    channels: Arc<Vec<Box<dyn NotificationChannel>>>,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = vec![Box::new(LogChannel)];

        if let Some(ref webhook_url) = config.discord_webhook_url {
            match DiscordWebhookChannel::new(webhook_url.clone(), config.webhook_timeout) {
                Ok(channel) => {
                    channels.push(Box::new(channel));
                    tracing::info!("Discord webhook notifications enabled");
                }
                Err(e) => tracing::warn!("Failed to initialize Discord webhook: {}", e),
            }
        } else {
            tracing::info!("Alerts go to the log only (set DISCORD_WEBHOOK_URL for Discord)");
        }

        Self::with_channels(channels)
    }

    pub fn with_channels(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self {
            channels: Arc::new(channels),
        }
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Send an alert to all channels. A failing channel does not stop the others.
    pub async fn send_alert(&self, alert: &Alert) -> Result<(), NotificationError> {
        let mut failures = Vec::new();
        for channel in self.channels.iter() {
            match channel.send(alert).await {
                Ok(()) => tracing::debug!("Sent notification via {}", channel.name()),
                Err(e) => {
                    tracing::warn!("Failed to send notification via {}: {}", channel.name(), e);
                    failures.push(format!("{}: {}", channel.name(), e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotificationError::Partial {
                failed: failures.len(),
                total: self.channels.len(),
                details: failures.join("; "),
            })
        }
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn notify(&self, record: &EvaluationRecord) -> Result<(), NotificationError> {
        self.send_alert(&Alert::from_record(record)).await
    }
}

#[cfg(test)]
mod test_support;
