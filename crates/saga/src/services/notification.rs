//! Notification sink trait and in-memory outbox.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OwnerId;
use domain::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{SinkError, read, write};

/// Whether a notification announces a confirmation or a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Confirmed,
    Cancelled,
}

/// A dispatched notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationReceipt {
    pub notification_id: String,
    pub owner_id: OwnerId,
    pub amount: Money,
    pub status: NotificationStatus,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
}

impl NotificationReceipt {
    /// Builds the message for a booking event. A reference means the booking
    /// was confirmed; no reference means it was cancelled.
    pub fn compose(owner_id: &OwnerId, amount: Money, reference: Option<&str>) -> Self {
        let status = match reference {
            Some(_) => NotificationStatus::Confirmed,
            None => NotificationStatus::Cancelled,
        };
        let subject = format!(
            "Booking {} for {}",
            match status {
                NotificationStatus::Confirmed => "confirmed",
                NotificationStatus::Cancelled => "cancelled",
            },
            reference.unwrap_or("most recent booking")
        );

        Self {
            notification_id: Uuid::new_v4().to_string(),
            owner_id: owner_id.clone(),
            amount,
            status,
            subject,
            sent_at: Utc::now(),
        }
    }
}

/// Dispatches booking notifications to owners.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        owner_id: &OwnerId,
        amount: Money,
        reference: Option<&str>,
    ) -> Result<NotificationReceipt, SinkError>;
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<NotificationReceipt>,
    fail_on_notify: bool,
    delay: Option<Duration>,
}

/// Notifier that keeps every sent message in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every notify fail.
    pub fn set_fail_on_notify(&self, fail: bool) {
        write(&self.state).fail_on_notify = fail;
    }

    /// Delays every notify by `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        write(&self.state).delay = delay;
    }

    /// Returns every notification sent so far.
    pub fn sent(&self) -> Vec<NotificationReceipt> {
        read(&self.state).sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        read(&self.state).sent.len()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotifier {
    async fn notify(
        &self,
        owner_id: &OwnerId,
        amount: Money,
        reference: Option<&str>,
    ) -> Result<NotificationReceipt, SinkError> {
        let delay = read(&self.state).delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = write(&self.state);
        if state.fail_on_notify {
            return Err(SinkError::Unavailable("mail relay unreachable".to_string()));
        }

        let receipt = NotificationReceipt::compose(owner_id, amount, reference);
        tracing::debug!(%owner_id, subject = %receipt.subject, "notification sent");
        state.sent.push(receipt.clone());
        Ok(receipt)
    }
}
