//! Conversation read-model for messages.
//!
//! Moves the last-message pointer (newer wins) and maintains unread sets.
//! Both are upserts or set operations, never counters.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::settle;
use crate::application::bus::{EventHandler, Handled};
use crate::application::services::{IdempotencyError, IdempotencyService};
use crate::config::FailurePolicy;
use crate::domain::events::message::{MessageDeleted, MessageSent};
use crate::domain::events::EventEnvelope;
use crate::domain::{ConversationStateRepository, LastMessage};

pub struct MessageStateListener {
    idempotency: Arc<IdempotencyService>,
    state: Arc<dyn ConversationStateRepository>,
    policy: FailurePolicy,
}

impl MessageStateListener {
    pub const HANDLER_ID: &'static str = "message-conversation-state";
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
}

#[async_trait]
impl EventHandler<MessageSent> for MessageStateListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(&self, envelope: &EventEnvelope<MessageSent>) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        let last = LastMessage {
            conversation_id: event.conversation_id.clone(),
            message_id: event.message_id.clone(),
            sender_id: event.sender_id.clone(),
            sent_at: envelope.metadata().occurred_at(),
        };

        let result = self
            .idempotency
            .run_for(envelope, Self::HANDLER_ID, || async {
                self.state.record_last_message(&last).await?;
                let marked = self
                    .state
                    .mark_unread(&event.conversation_id, &event.message_id, &event.sender_id)
                    .await?;
                debug!(conversation_id = %event.conversation_id, marked, "Message state updated");
                Ok::<_, anyhow::Error>(marked)
            })
            .await;

        settle(Self::HANDLER_ID, self.policy, envelope.event_id(), result)
    }
}

#[async_trait]
impl EventHandler<MessageDeleted> for MessageStateListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(
        &self,
        envelope: &EventEnvelope<MessageDeleted>,
    ) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();

        let result = self
            .idempotency
            .run_for(envelope, Self::HANDLER_ID, || async {
                let cleared = self
                    .state
                    .clear_last_message(&event.conversation_id, &event.message_id)
                    .await?;
                let unmarked = self
                    .state
                    .remove_unread(&event.conversation_id, &event.message_id)
                    .await?;
                debug!(conversation_id = %event.conversation_id, cleared, unmarked, "Deleted message dropped from state");
                Ok::<_, anyhow::Error>(())
            })
            .await;

        settle(Self::HANDLER_ID, self.policy, envelope.event_id(), result)
    }
}
