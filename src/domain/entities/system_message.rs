//! System message entity and repository trait.
//!
//! Maps to the `system_messages` table. A system message is the timeline
//! line a listener writes in reaction to an event ("alice added bob").
//! `(source_event_id, handler_id)` is unique, so one event yields at most one
//! line per listener however often it is delivered.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::shared::error::AppError;

/// What the line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemMessageKind {
    ConversationCreated,
    MemberAdded,
    MemberLeft,
    MemberRemoved,
    CallEnded,
    CallMissed,
}

impl SystemMessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConversationCreated => "conversation_created",
            Self::MemberAdded => "member_added",
            Self::MemberLeft => "member_left",
            Self::MemberRemoved => "member_removed",
            Self::CallEnded => "call_ended",
            Self::CallMissed => "call_missed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMessage {
    pub id: Uuid,
    pub conversation_id: String,
    pub kind: SystemMessageKind,
    pub body: String,
    /// Structured fields for clients that render their own text.
    pub data: Value,
    pub source_event_id: Uuid,
    pub handler_id: String,
    pub created_at: DateTime<Utc>,
}

impl SystemMessage {
    pub fn new(
        conversation_id: impl Into<String>,
        kind: SystemMessageKind,
        body: impl Into<String>,
        data: Value,
        source_event_id: Uuid,
        handler_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id: conversation_id.into(),
            kind,
            body: body.into(),
            data,
            source_event_id,
            handler_id: handler_id.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SystemMessageRepository: Send + Sync {
    /// Insert unless a message for the same source event and handler exists.
    ///
    /// Returns `true` when a row was written.
    async fn create_for_event(&self, message: &SystemMessage) -> Result<bool, AppError>;

    /// Timeline lines of a conversation, oldest first.
    async fn list_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<SystemMessage>, AppError>;
}
