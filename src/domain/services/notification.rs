//! Push notification port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::error::AppError;

/// A push notification addressed to every device watching a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    pub conversation_id: String,
    /// Users that should not be notified (usually the sender).
    pub exclude_user_ids: Vec<String>,
    pub title: String,
    pub body: String,
    pub data: Value,
}

/// Outbound delivery of push notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn push(&self, notification: &PushNotification) -> Result<(), AppError>;
}
