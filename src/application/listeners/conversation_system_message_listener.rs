//! Conversation timeline messages.
//!
//! Writes one system message per membership event. The row is keyed by the
//! source event and handler id, so a racing second delivery inserts nothing.

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
use crate::domain::services::SystemText;
use crate::domain::{SystemMessage, SystemMessageKind, SystemMessageRepository};

pub struct ConversationSystemMessageListener {
    idempotency: Arc<IdempotencyService>,
    messages: Arc<dyn SystemMessageRepository>,
    policy: FailurePolicy,
}

impl ConversationSystemMessageListener {
    pub const HANDLER_ID: &'static str = "conversation-system-messages";
    pub const DEFAULT_POLICY: FailurePolicy = FailurePolicy::Strict;

    pub fn new(
        idempotency: Arc<IdempotencyService>,
        messages: Arc<dyn SystemMessageRepository>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            idempotency,
            messages,
            policy,
        }
    }

    async fn post<E: DomainEvent>(
        &self,
        envelope: &EventEnvelope<E>,
        conversation_id: &str,
        kind: SystemMessageKind,
        body: String,
    ) -> Result<Handled, IdempotencyError> {
        let result = self
            .idempotency
            .run_for(envelope, Self::HANDLER_ID, || async {
                let message = SystemMessage::new(
                    conversation_id,
                    kind,
                    body,
                    envelope.payload_json()?,
                    envelope.event_id(),
                    Self::HANDLER_ID,
                );
                let inserted = self.messages.create_for_event(&message).await?;
                debug!(conversation_id, kind = kind.as_str(), inserted, "System message posted");
                Ok::<_, anyhow::Error>(inserted)
            })
            .await;

        settle(Self::HANDLER_ID, self.policy, envelope.event_id(), result)
    }
}

#[async_trait]
impl EventHandler<ConversationCreated> for ConversationSystemMessageListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(
        &self,
        envelope: &EventEnvelope<ConversationCreated>,
    ) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        self.post(
            envelope,
            &event.conversation_id,
            SystemMessageKind::ConversationCreated,
            SystemText::conversation_created(event),
        )
        .await
    }
}

#[async_trait]
impl EventHandler<ConversationMemberAdded> for ConversationSystemMessageListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(
        &self,
        envelope: &EventEnvelope<ConversationMemberAdded>,
    ) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        self.post(
            envelope,
            &event.conversation_id,
            SystemMessageKind::MemberAdded,
            SystemText::member_added(event),
        )
        .await
    }
}

#[async_trait]
impl EventHandler<ConversationMemberLeft> for ConversationSystemMessageListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(
        &self,
        envelope: &EventEnvelope<ConversationMemberLeft>,
    ) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        self.post(
            envelope,
            &event.conversation_id,
            SystemMessageKind::MemberLeft,
            SystemText::member_left(event),
        )
        .await
    }
}

#[async_trait]
impl EventHandler<ConversationMemberRemoved> for ConversationSystemMessageListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(
        &self,
        envelope: &EventEnvelope<ConversationMemberRemoved>,
    ) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        self.post(
            envelope,
            &event.conversation_id,
            SystemMessageKind::MemberRemoved,
            SystemText::member_removed(event),
        )
        .await
    }
}
