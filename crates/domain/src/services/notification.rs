//! Notification channel for scheduled export outcomes.
//!
//! Fire-and-forget from this service's perspective: a delivery failure is
//! logged and never changes a job's terminal status.

use async_trait::async_trait;
use std::sync::Mutex;

/// Result of a notification send attempt.
#[derive(Debug, Clone)]
pub enum NotifyResult {
    /// Notification was handed to the channel.
    Sent,
    /// Nothing to send (no targets configured).
    Skipped,
    /// Delivery failed (non-blocking).
    Failed(String),
}

/// Notification channel trait.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a message to the given targets. Target addresses are opaque to
    /// this service; the channel decides how to deliver them.
    async fn notify(&self, targets: &[String], subject: &str, body: &str) -> NotifyResult;
}

/// A recorded notification, for assertions in tests.
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub targets: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Mock notifier for development and testing. Records messages instead of
/// delivering them.
#[derive(Debug, Default)]
pub struct MockNotifier {
    /// Whether to simulate delivery failures.
    pub simulate_failure: bool,
    sent: Mutex<Vec<SentNotification>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock that simulates delivery failures.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Messages recorded so far.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().expect("notifier lock poisoned").clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, targets: &[String], subject: &str, body: &str) -> NotifyResult {
        if targets.is_empty() {
            return NotifyResult::Skipped;
        }

        if self.simulate_failure {
            tracing::warn!(
                targets = targets.len(),
                subject = %subject,
                "Mock notifier simulating failure"
            );
            return NotifyResult::Failed("Simulated failure".to_string());
        }

        self.sent
            .lock()
            .expect("notifier lock poisoned")
            .push(SentNotification {
                targets: targets.to_vec(),
                subject: subject.to_string(),
                body: body.to_string(),
            });

        tracing::info!(
            targets = targets.len(),
            subject = %subject,
            "Mock: would send notification"
        );
        NotifyResult::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_notifier_records_messages() {
        let notifier = MockNotifier::new();
        let targets = vec!["ops@example.com".to_string()];

        let result = notifier.notify(&targets, "Export completed", "42 records").await;
        assert!(matches!(result, NotifyResult::Sent));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Export completed");
    }

    #[tokio::test]
    async fn test_mock_notifier_skips_empty_targets() {
        let notifier = MockNotifier::new();
        let result = notifier.notify(&[], "subject", "body").await;
        assert!(matches!(result, NotifyResult::Skipped));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_mock_notifier_failure() {
        let notifier = MockNotifier::failing();
        let targets = vec!["ops@example.com".to_string()];
        let result = notifier.notify(&targets, "subject", "body").await;
        assert!(matches!(result, NotifyResult::Failed(_)));
    }
}
