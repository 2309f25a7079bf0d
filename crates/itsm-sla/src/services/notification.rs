//! Notification sink seam.
//!
//! Delivery channels (email, SMS, push) live outside the engine. The engine
//! hands a [`NotificationMessage`] to a [`NotificationSink`] through a
//! [`Notifier`], which bounds every call with the configured timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use itsm_core::{TenantId, TicketId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Result, SlaError};

/// A message for the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub tenant_id: TenantId,
    pub ticket_id: TicketId,
    pub subject: String,
    pub body: String,
    /// Channel hints, e.g. `email`, `slack`.
    #[serde(default)]
    pub channels: Vec<String>,
}

/// External delivery collaborator.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `message` to `recipients`.
    async fn notify(&self, recipients: &[UserId], message: &NotificationMessage) -> Result<()>;
}

/// Sink that only logs. Used when no delivery collaborator is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationSink;

#[async_trait::async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify(&self, recipients: &[UserId], message: &NotificationMessage) -> Result<()> {
        info!(
            tenant_id = %message.tenant_id,
            ticket_id = %message.ticket_id,
            recipients = recipients.len(),
            subject = %message.subject,
            "SLA notification"
        );
        Ok(())
    }
}

/// A delivered notification as seen by [`RecordingNotificationSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedNotification {
    pub recipients: Vec<UserId>,
    pub message: NotificationMessage,
}

/// In-memory sink that records deliveries (for testing).
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    sent: Arc<RwLock<Vec<RecordedNotification>>>,
    failing: AtomicBool,
}

impl RecordingNotificationSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Deliveries recorded so far.
    pub async fn sent(&self) -> Vec<RecordedNotification> {
        self.sent.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.sent.read().await.len()
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(&self, recipients: &[UserId], message: &NotificationMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SlaError::Notification("sink unavailable".to_string()));
        }
        self.sent.write().await.push(RecordedNotification {
            recipients: recipients.to_vec(),
            message: message.clone(),
        });
        Ok(())
    }
}

/// Bounded, best-effort access to a [`NotificationSink`].
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    timeout: Duration,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    /// Deliver a message, failing with `NotificationTimeout` if the sink does
    /// not answer in time.
    pub async fn send(&self, recipients: &[UserId], message: &NotificationMessage) -> Result<()> {
        match tokio::time::timeout(self.timeout, self.sink.notify(recipients, message)).await {
            Ok(result) => result,
            Err(_) => Err(SlaError::NotificationTimeout(
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    /// Deliver a message and report success. Failures are logged, not returned.
    pub async fn send_best_effort(
        &self,
        recipients: &[UserId],
        message: &NotificationMessage,
    ) -> bool {
        match self.send(recipients, message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    ticket_id = %message.ticket_id,
                    error = %e,
                    "Failed to deliver SLA notification"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StalledSink;

    #[async_trait::async_trait]
    impl NotificationSink for StalledSink {
        async fn notify(&self, _: &[UserId], _: &NotificationMessage) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn message() -> NotificationMessage {
        NotificationMessage {
            tenant_id: TenantId::new(),
            ticket_id: TicketId::new(),
            subject: "SLA warning".to_string(),
            body: "20% of response time remaining".to_string(),
            channels: vec!["email".to_string()],
        }
    }

    #[tokio::test]
    async fn test_recording_sink_records_and_fails_on_demand() {
        let sink = Arc::new(RecordingNotificationSink::new());
        let notifier = Notifier::new(sink.clone(), Duration::from_secs(1));
        let user = UserId::new();

        assert!(notifier.send_best_effort(&[user], &message()).await);
        sink.set_failing(true);
        assert!(!notifier.send_best_effort(&[user], &message()).await);

        let sent = sink.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipients, vec![user]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_sink_times_out() {
        let notifier = Notifier::new(Arc::new(StalledSink), Duration::from_millis(250));
        let err = notifier.send(&[], &message()).await.unwrap_err();
        assert!(matches!(err, SlaError::NotificationTimeout(250)));
    }
}
