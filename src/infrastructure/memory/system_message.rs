//! In-memory system message timeline.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{SystemMessage, SystemMessageRepository};
use crate::shared::error::AppError;

#[derive(Debug, Default)]
pub struct InMemorySystemMessageRepository {
    messages: RwLock<Vec<SystemMessage>>,
}

impl InMemorySystemMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

#[async_trait]
impl SystemMessageRepository for InMemorySystemMessageRepository {
    async fn create_for_event(&self, message: &SystemMessage) -> Result<bool, AppError> {
        let mut messages = self.messages.write();
        let exists = messages.iter().any(|m| {
            m.source_event_id == message.source_event_id && m.handler_id == message.handler_id
        });
        if exists {
            return Ok(false);
        }
        messages.push(message.clone());
        Ok(true)
    }

    async fn list_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<SystemMessage>, AppError> {
        Ok(self
            .messages
            .read()
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }
}
