//! Messaging module events.

use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::{Validate, ValidationError};

use super::{EventKind, EventPayload};
use crate::domain::versioning::transforms::{add_field, remove_field};
use crate::domain::versioning::LinearStrategy;

/// Kind of message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    File,
}

/// A message was posted to a conversation.
///
/// v2 added `message_type`; v1 payloads are all text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "text_requires_content"))]
pub struct MessageSent {
    #[validate(length(min = 1))]
    pub message_id: String,
    #[validate(length(min = 1))]
    pub conversation_id: String,
    #[validate(length(min = 1))]
    pub sender_id: String,
    #[validate(length(max = 4000))]
    pub content: String,
    pub message_type: MessageType,
    #[serde(default)]
    pub reply_to_id: Option<String>,
}

/// `MessageSent` as consumers written against v1 see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSentV1 {
    pub message_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(default)]
    pub reply_to_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct MessageEdited {
    #[validate(length(min = 1))]
    pub message_id: String,
    #[validate(length(min = 1))]
    pub conversation_id: String,
    #[validate(length(min = 1))]
    pub editor_id: String,
    #[validate(length(min = 1, max = 4000))]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct MessageDeleted {
    #[validate(length(min = 1))]
    pub message_id: String,
    #[validate(length(min = 1))]
    pub conversation_id: String,
    #[validate(length(min = 1))]
    pub deleted_by: String,
}

fn text_requires_content(event: &MessageSent) -> Result<(), ValidationError> {
    if event.message_type == MessageType::Text && event.content.trim().is_empty() {
        return Err(ValidationError::new("empty_text")
            .with_message("text messages need content".into()));
    }
    Ok(())
}

impl EventPayload for MessageSent {
    fn aggregate_id(&self) -> String {
        self.message_id.clone()
    }
}

impl EventPayload for MessageEdited {
    fn aggregate_id(&self) -> String {
        self.message_id.clone()
    }
}

impl EventPayload for MessageDeleted {
    fn aggregate_id(&self) -> String {
        self.message_id.clone()
    }
}

pub fn version_strategies() -> Vec<(EventKind, LinearStrategy)> {
    vec![
        (
            EventKind::MessageSent,
            LinearStrategy::new(2)
                .with_upgrade(1, add_field("message_type", json!("TEXT")))
                .with_downgrade(2, remove_field("message_type")),
        ),
        (EventKind::MessageEdited, LinearStrategy::new(1)),
        (EventKind::MessageDeleted, LinearStrategy::new(1)),
    ]
}
