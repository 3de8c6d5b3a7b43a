//! Notification sink that keeps what it was asked to send.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::services::{NotificationSink, PushNotification};
use crate::shared::error::AppError;

#[derive(Debug, Default)]
pub struct InMemoryNotificationSink {
    sent: Mutex<Vec<PushNotification>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<PushNotification> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn push(&self, notification: &PushNotification) -> Result<(), AppError> {
        debug!(conversation_id = %notification.conversation_id, "Notification recorded");
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}
