//! Conversation member sets.
//!
//! Keeps `conversation_members` in step with membership events so unread
//! fan-out knows who to mark. Set insert and remove are both safe to repeat.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::settle;
use crate::application::bus::{EventHandler, Handled};
use crate::application::services::{IdempotencyError, IdempotencyService};
use crate::config::FailurePolicy;
use crate::domain::events::conversation::{
    ConversationCreated, ConversationMemberAdded, ConversationMemberLeft,
    ConversationMemberRemoved,
};
use crate::domain::events::{DomainEvent, EventEnvelope};
use crate::domain::ConversationStateRepository;

pub struct ConversationMembershipListener {
    idempotency: Arc<IdempotencyService>,
    state: Arc<dyn ConversationStateRepository>,
    policy: FailurePolicy,
}

impl ConversationMembershipListener {
    pub const HANDLER_ID: &'static str = "conversation-membership";
    pub const DEFAULT_POLICY: FailurePolicy = FailurePolicy::Strict;

    pub fn new(
        idempotency: Arc<IdempotencyService>,
        state: Arc<dyn ConversationStateRepository>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            idempotency,
            state,
            policy,
        }
    }

    async fn add<E: DomainEvent>(
        &self,
        envelope: &EventEnvelope<E>,
        conversation_id: &str,
        user_ids: Vec<String>,
    ) -> Result<Handled, IdempotencyError> {
        let result = self
            .idempotency
            .run_for(envelope, Self::HANDLER_ID, || async {
                let added = self.state.add_members(conversation_id, &user_ids).await?;
                debug!(conversation_id, added, "Members added");
                Ok::<_, anyhow::Error>(added)
            })
            .await;

        settle(Self::HANDLER_ID, self.policy, envelope.event_id(), result)
    }

    async fn remove<E: DomainEvent>(
        &self,
        envelope: &EventEnvelope<E>,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Handled, IdempotencyError> {
        let result = self
            .idempotency
            .run_for(envelope, Self::HANDLER_ID, || async {
                let removed = self.state.remove_member(conversation_id, user_id).await?;
                debug!(conversation_id, user_id, removed, "Member removed");
                Ok::<_, anyhow::Error>(removed)
            })
            .await;

        settle(Self::HANDLER_ID, self.policy, envelope.event_id(), result)
    }
}

#[async_trait]
impl EventHandler<ConversationCreated> for ConversationMembershipListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(
        &self,
        envelope: &EventEnvelope<ConversationCreated>,
    ) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        let mut members = event.member_ids.clone();
        if !members.contains(&event.creator_id) {
            members.push(event.creator_id.clone());
        }
        self.add(envelope, &event.conversation_id, members).await
    }
}

#[async_trait]
impl EventHandler<ConversationMemberAdded> for ConversationMembershipListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(
        &self,
        envelope: &EventEnvelope<ConversationMemberAdded>,
    ) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        self.add(envelope, &event.conversation_id, vec![event.member_id.clone()])
            .await
    }
}

#[async_trait]
impl EventHandler<ConversationMemberLeft> for ConversationMembershipListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(
        &self,
        envelope: &EventEnvelope<ConversationMemberLeft>,
    ) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        self.remove(envelope, &event.conversation_id, &event.member_id)
            .await
    }
}

#[async_trait]
impl EventHandler<ConversationMemberRemoved> for ConversationMembershipListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(
        &self,
        envelope: &EventEnvelope<ConversationMemberRemoved>,
    ) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        self.remove(envelope, &event.conversation_id, &event.member_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::listeners::testing;
    use crate::domain::events::conversation::ConversationType;
    use crate::infrastructure::memory::InMemoryConversationState;

    #[tokio::test]
    async fn test_created_adds_creator_and_members() {
        let (idempotency, _) = testing::idempotency();
        let state = Arc::new(InMemoryConversationState::new());
        let listener =
            ConversationMembershipListener::new(idempotency, state.clone(), FailurePolicy::Strict);

        listener
            .handle(&EventEnvelope::new(ConversationCreated {
                conversation_id: "c1".into(),
                creator_id: "u1".into(),
                conversation_type: ConversationType::Group,
                member_ids: vec!["u2".into(), "u3".into()],
                title: None,
            }))
            .await
            .unwrap();
        listener
            .handle(&EventEnvelope::new(ConversationMemberLeft {
                conversation_id: "c1".into(),
                member_id: "u3".into(),
            }))
            .await
            .unwrap();

        assert_eq!(state.members("c1").await.unwrap(), vec!["u1", "u2"]);
    }
}
