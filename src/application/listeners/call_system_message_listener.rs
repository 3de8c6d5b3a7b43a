//! Call timeline messages ("Video call ended (1:35)", "Missed audio call").

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::settle;
use crate::application::bus::{EventHandler, Handled};
use crate::application::services::{IdempotencyError, IdempotencyService};
use crate::config::FailurePolicy;
use crate::domain::events::call::{CallEnded, CallMissed};
use crate::domain::events::{DomainEvent, EventEnvelope};
use crate::domain::services::SystemText;
use crate::domain::{SystemMessage, SystemMessageKind, SystemMessageRepository};

pub struct CallSystemMessageListener {
    idempotency: Arc<IdempotencyService>,
    messages: Arc<dyn SystemMessageRepository>,
    policy: FailurePolicy,
}

impl CallSystemMessageListener {
    pub const HANDLER_ID: &'static str = "call-system-messages";
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
                debug!(conversation_id, kind = kind.as_str(), inserted, "Call message posted");
                Ok::<_, anyhow::Error>(inserted)
            })
            .await;

        settle(Self::HANDLER_ID, self.policy, envelope.event_id(), result)
    }
}

#[async_trait]
impl EventHandler<CallEnded> for CallSystemMessageListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(&self, envelope: &EventEnvelope<CallEnded>) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        self.post(
            envelope,
            &event.conversation_id,
            SystemMessageKind::CallEnded,
            SystemText::call_ended(event),
        )
        .await
    }
}

#[async_trait]
impl EventHandler<CallMissed> for CallSystemMessageListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(&self, envelope: &EventEnvelope<CallMissed>) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        self.post(
            envelope,
            &event.conversation_id,
            SystemMessageKind::CallMissed,
            SystemText::call_missed(event),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::listeners::testing;
    use crate::domain::events::call::CallType;
    use crate::domain::MockSystemMessageRepository;
    use crate::infrastructure::memory::InMemorySystemMessageRepository;
    use crate::shared::error::AppError;

    #[tokio::test]
    async fn test_call_ended_line() {
        let (idempotency, _) = testing::idempotency();
        let repo = Arc::new(InMemorySystemMessageRepository::new());
        let listener = CallSystemMessageListener::new(idempotency, repo.clone(), FailurePolicy::Strict);

        listener
            .handle(&EventEnvelope::new(CallEnded {
                call_id: "k1".into(),
                conversation_id: "c1".into(),
                ended_by: "u1".into(),
                call_type: CallType::Video,
                duration_seconds: 95,
            }))
            .await
            .unwrap();

        let lines = repo.list_for_conversation("c1").await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].body, "Video call ended (1:35)");
        assert_eq!(lines[0].handler_id, CallSystemMessageListener::HANDLER_ID);
    }

    #[tokio::test]
    async fn test_failed_insert_is_raised_on_redelivery() {
        let (idempotency, _) = testing::idempotency();
        let mut repo = MockSystemMessageRepository::new();
        repo.expect_create_for_event()
            .times(1)
            .returning(|_| Err(AppError::Internal("disk full".into())));
        let listener =
            CallSystemMessageListener::new(idempotency, Arc::new(repo), FailurePolicy::Strict);
        let envelope = EventEnvelope::new(CallMissed {
            call_id: "k2".into(),
            conversation_id: "c1".into(),
            caller_id: "u2".into(),
            call_type: CallType::Audio,
        });

        let first = listener.handle(&envelope).await.unwrap_err();
        assert_eq!(first.kind(), "handler_failure");

        // default ledger policy surfaces the earlier failure without re-running
        let second = listener.handle(&envelope).await.unwrap_err();
        assert_eq!(second.kind(), "previously_failed");
    }
}
