//! Notification Delivery
//!
//! Redis pub/sub fan-out for push notifications. Each notification is
//! published as JSON on the conversation's channel; gateway nodes subscribed
//! to it forward the payload to connected devices.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, instrument};

use crate::domain::services::{NotificationSink, PushNotification};
use crate::infrastructure::cache::keys;
use crate::shared::error::AppError;

/// Publishes notifications on `notifications:conversation:{id}`.
#[derive(Clone)]
pub struct RedisNotificationSink {
    conn: ConnectionManager,
}

impl RedisNotificationSink {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl NotificationSink for RedisNotificationSink {
    #[instrument(skip(self, notification), fields(conversation_id = %notification.conversation_id), level = "debug")]
    async fn push(&self, notification: &PushNotification) -> Result<(), AppError> {
        let channel = keys::notification_channel(&notification.conversation_id);
        let payload = serde_json::to_string(notification)?;
        let mut conn = self.conn.clone();

        let receivers: i64 = conn.publish(&channel, payload).await?;
        debug!(channel = %channel, receivers, "Notification published");

        Ok(())
    }
}

impl std::fmt::Debug for RedisNotificationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisNotificationSink").finish_non_exhaustive()
    }
}
