//! Notification channel adapters.
//!
//! The console provider logs notification content instead of delivering it,
//! which is the development default. A disabled channel drops messages.

use async_trait::async_trait;
use std::sync::Arc;

use domain::services::notification::{Notifier, NotifyResult};

use crate::config::NotificationConfig;

/// Notifier that writes notifications to the service log.
pub struct ConsoleNotifier {
    sender_name: String,
}

impl ConsoleNotifier {
    pub fn new(sender_name: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
        }
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, targets: &[String], subject: &str, body: &str) -> NotifyResult {
        if targets.is_empty() {
            return NotifyResult::Skipped;
        }

        tracing::info!(
            sender = %self.sender_name,
            targets = %targets.join(", "),
            subject = %subject,
            body = %body,
            "Notification (console provider)"
        );
        NotifyResult::Sent
    }
}

/// Notifier used when the channel is disabled.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, targets: &[String], subject: &str, _body: &str) -> NotifyResult {
        tracing::debug!(
            targets = targets.len(),
            subject = %subject,
            "Notifications disabled, dropping message"
        );
        NotifyResult::Skipped
    }
}

/// Build the notifier for the configured provider.
pub fn build_notifier(config: &NotificationConfig) -> Arc<dyn Notifier> {
    if !config.enabled {
        return Arc::new(NoopNotifier);
    }

    match config.provider.as_str() {
        "console" => Arc::new(ConsoleNotifier::new(config.sender_name.clone())),
        other => {
            tracing::warn!(provider = %other, "Unknown notification provider, using console");
            Arc::new(ConsoleNotifier::new(config.sender_name.clone()))
        }
    }
}
