//! Conversation read-model state and repository trait.
//!
//! Maps to `conversation_last_message`, `unread_messages` and
//! `conversation_members`. Every write is an upsert or a set operation so a
//! repeated delivery leaves the state unchanged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Pointer to the newest message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub conversation_id: String,
    pub message_id: String,
    pub sender_id: String,
    pub sent_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationStateRepository: Send + Sync {
    /// Move the pointer to `message` unless the stored one is newer.
    async fn record_last_message(&self, message: &LastMessage) -> Result<(), AppError>;

    async fn last_message(&self, conversation_id: &str) -> Result<Option<LastMessage>, AppError>;

    /// Drop the pointer when it still names `message_id`.
    async fn clear_last_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<bool, AppError>;

    /// Add `message_id` to the unread set of every member except the sender.
    async fn mark_unread(
        &self,
        conversation_id: &str,
        message_id: &str,
        sender_id: &str,
    ) -> Result<u64, AppError>;

    /// Remove `message_id` from every member's unread set.
    async fn remove_unread(&self, conversation_id: &str, message_id: &str)
        -> Result<u64, AppError>;

    async fn unread_count(&self, conversation_id: &str, user_id: &str) -> Result<u64, AppError>;

    /// Member user ids of a conversation, sorted.
    async fn members(&self, conversation_id: &str) -> Result<Vec<String>, AppError>;

    /// Set-insert members; already present ids are left alone.
    async fn add_members(&self, conversation_id: &str, user_ids: &[String])
        -> Result<u64, AppError>;

    /// Remove a member and their unread set for the conversation.
    async fn remove_member(&self, conversation_id: &str, user_id: &str) -> Result<bool, AppError>;
}
