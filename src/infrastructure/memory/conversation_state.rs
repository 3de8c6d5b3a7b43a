//! In-memory conversation read-model.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::domain::{ConversationStateRepository, LastMessage};
use crate::shared::error::AppError;

#[derive(Debug, Default)]
pub struct InMemoryConversationState {
    last_messages: DashMap<String, LastMessage>,
    members: DashMap<String, BTreeSet<String>>,
    /// (conversation id, user id) -> unread message ids
    unread: RwLock<HashMap<(String, String), BTreeSet<String>>>,
}

impl InMemoryConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_members(&self, conversation_id: &str, user_ids: &[&str]) {
        self.members
            .entry(conversation_id.to_string())
            .or_default()
            .extend(user_ids.iter().map(|id| id.to_string()));
    }
}

#[async_trait]
impl ConversationStateRepository for InMemoryConversationState {
    async fn record_last_message(&self, message: &LastMessage) -> Result<(), AppError> {
        self.last_messages
            .entry(message.conversation_id.clone())
            .and_modify(|current| {
                if current.sent_at <= message.sent_at {
                    *current = message.clone();
                }
            })
            .or_insert_with(|| message.clone());
        Ok(())
    }

    async fn last_message(&self, conversation_id: &str) -> Result<Option<LastMessage>, AppError> {
        Ok(self
            .last_messages
            .get(conversation_id)
            .map(|m| m.value().clone()))
    }

    async fn clear_last_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<bool, AppError> {
        Ok(self
            .last_messages
            .remove_if(conversation_id, |_, m| m.message_id == message_id)
            .is_some())
    }

    async fn mark_unread(
        &self,
        conversation_id: &str,
        message_id: &str,
        sender_id: &str,
    ) -> Result<u64, AppError> {
        let members = self.members(conversation_id).await?;
        let mut unread = self.unread.write();
        let mut marked = 0;
        for member in members.into_iter().filter(|m| m != sender_id) {
            let inserted = unread
                .entry((conversation_id.to_string(), member))
                .or_default()
                .insert(message_id.to_string());
            if inserted {
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn remove_unread(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<u64, AppError> {
        let mut removed = 0;
        for ((conversation, _), messages) in self.unread.write().iter_mut() {
            if conversation == conversation_id && messages.remove(message_id) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn unread_count(&self, conversation_id: &str, user_id: &str) -> Result<u64, AppError> {
        Ok(self
            .unread
            .read()
            .get(&(conversation_id.to_string(), user_id.to_string()))
            .map_or(0, |messages| messages.len() as u64))
    }

    async fn members(&self, conversation_id: &str) -> Result<Vec<String>, AppError> {
        Ok(self
            .members
            .get(conversation_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_members(
        &self,
        conversation_id: &str,
        user_ids: &[String],
    ) -> Result<u64, AppError> {
        let mut members = self.members.entry(conversation_id.to_string()).or_default();
        let added = user_ids
            .iter()
            .filter(|id| members.insert((*id).clone()))
            .count();
        Ok(added as u64)
    }

    async fn remove_member(&self, conversation_id: &str, user_id: &str) -> Result<bool, AppError> {
        let removed = self
            .members
            .get_mut(conversation_id)
            .is_some_and(|mut set| set.remove(user_id));
        self.unread
            .write()
            .remove(&(conversation_id.to_string(), user_id.to_string()));
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn last(message_id: &str, offset_secs: i64) -> LastMessage {
        LastMessage {
            conversation_id: "c1".into(),
            message_id: message_id.into(),
            sender_id: "u1".into(),
            sent_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[tokio::test]
    async fn test_older_message_does_not_move_pointer() {
        let state = InMemoryConversationState::new();
        state.record_last_message(&last("m2", 10)).await.unwrap();
        state.record_last_message(&last("m1", 0)).await.unwrap();

        let current = state.last_message("c1").await.unwrap().unwrap();
        assert_eq!(current.message_id, "m2");
        assert!(!state.clear_last_message("c1", "m1").await.unwrap());
        assert!(state.clear_last_message("c1", "m2").await.unwrap());
    }

    #[tokio::test]
    async fn test_members_are_a_set() {
        let state = InMemoryConversationState::new();
        let ids = vec!["u2".to_string(), "u1".to_string()];

        assert_eq!(state.add_members("c1", &ids).await.unwrap(), 2);
        assert_eq!(state.add_members("c1", &ids).await.unwrap(), 0);
        assert_eq!(state.members("c1").await.unwrap(), vec!["u1", "u2"]);
    }
}
