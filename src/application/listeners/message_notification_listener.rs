//! Push notifications for new messages.
//!
//! The notification pipeline was written against the v1 `message.sent`
//! payload and still reads it that way through the version registry. A missed
//! push is not worth blocking the event for, so failures are swallowed by
//! default.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, instrument};

use super::settle;
use crate::application::bus::{EventHandler, Handled};
use crate::application::services::{IdempotencyError, IdempotencyService};
use crate::config::FailurePolicy;
use crate::domain::events::message::{MessageSent, MessageSentV1};
use crate::domain::events::{DomainEvent, EventEnvelope};
use crate::domain::services::{NotificationSink, PushNotification};
use crate::domain::versioning::VersionRegistry;
use crate::infrastructure::metrics;

/// Longest body preview sent to devices, in characters.
const PREVIEW_CHARS: usize = 100;

pub struct MessageNotificationListener {
    idempotency: Arc<IdempotencyService>,
    versions: Arc<VersionRegistry>,
    sink: Arc<dyn NotificationSink>,
    policy: FailurePolicy,
}

impl MessageNotificationListener {
    pub const HANDLER_ID: &'static str = "message-push-notification";
    pub const DEFAULT_POLICY: FailurePolicy = FailurePolicy::Lenient;

    /// Payload version this listener consumes.
    pub const READ_VERSION: u32 = 1;

    pub fn new(
        idempotency: Arc<IdempotencyService>,
        versions: Arc<VersionRegistry>,
        sink: Arc<dyn NotificationSink>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            idempotency,
            versions,
            sink,
            policy,
        }
    }

    fn read_legacy(&self, envelope: &EventEnvelope<MessageSent>) -> anyhow::Result<MessageSentV1> {
        let result = envelope.read_as::<MessageSentV1>(&self.versions, Self::READ_VERSION);
        metrics::record_migration(MessageSent::KIND.as_str(), result.is_ok());
        Ok(result?)
    }
}

/// Notification for a v1 message, addressed to everyone but the sender.
pub fn notification_for(message: &MessageSentV1) -> PushNotification {
    let body = if message.content.trim().is_empty() {
        "Sent an attachment".to_string()
    } else {
        preview(&message.content)
    };

    PushNotification {
        conversation_id: message.conversation_id.clone(),
        exclude_user_ids: vec![message.sender_id.clone()],
        title: format!("New message from {}", message.sender_id),
        body,
        data: json!({
            "message_id": message.message_id,
            "conversation_id": message.conversation_id,
            "sender_id": message.sender_id,
            "reply_to_id": message.reply_to_id,
        }),
    }
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[async_trait]
impl EventHandler<MessageSent> for MessageNotificationListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(&self, envelope: &EventEnvelope<MessageSent>) -> Result<Handled, IdempotencyError> {
        let result = self
            .idempotency
            .run_for(envelope, Self::HANDLER_ID, || async {
                let message = self.read_legacy(envelope)?;
                let notification = notification_for(&message);
                self.sink.push(&notification).await?;
                debug!(conversation_id = %notification.conversation_id, "Push notification sent");
                Ok::<_, anyhow::Error>(())
            })
            .await;

        settle(Self::HANDLER_ID, self.policy, envelope.event_id(), result)
    }
}
