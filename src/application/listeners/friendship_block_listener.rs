//! Friendship cleanup on block.
//!
//! Blocking ends the friendship and cancels pending requests in both
//! directions. Relationship state must stay consistent, so failures
//! propagate and the event is retried on redelivery.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::settle;
use crate::application::bus::{EventHandler, Handled};
use crate::application::services::{IdempotencyError, IdempotencyService};
use crate::config::FailurePolicy;
use crate::domain::events::block::UserBlocked;
use crate::domain::events::EventEnvelope;
use crate::domain::FriendshipRepository;

pub struct FriendshipBlockListener {
    idempotency: Arc<IdempotencyService>,
    friendships: Arc<dyn FriendshipRepository>,
    policy: FailurePolicy,
}

impl FriendshipBlockListener {
    pub const HANDLER_ID: &'static str = "friendship-block-cleanup";
    pub const DEFAULT_POLICY: FailurePolicy = FailurePolicy::Strict;

    pub fn new(
        idempotency: Arc<IdempotencyService>,
        friendships: Arc<dyn FriendshipRepository>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            idempotency,
            friendships,
            policy,
        }
    }
}

#[async_trait]
impl EventHandler<UserBlocked> for FriendshipBlockListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(&self, envelope: &EventEnvelope<UserBlocked>) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        // the occurrence time keeps a replayed delete stamped like the first one
        let deleted_at = envelope.metadata().occurred_at();

        let result = self
            .idempotency
            .run_for(envelope, Self::HANDLER_ID, || async {
                let friendships = self
                    .friendships
                    .soft_delete_between(&event.blocker_id, &event.blocked_id, deleted_at)
                    .await?;
                let requests = self
                    .friendships
                    .cancel_pending_requests_between(&event.blocker_id, &event.blocked_id)
                    .await?;

                info!(
                    blocker_id = %event.blocker_id,
                    blocked_id = %event.blocked_id,
                    friendships,
                    requests,
                    "Relationship cleaned up after block"
                );
                Ok::<_, anyhow::Error>((friendships, requests))
            })
            .await;

        settle(Self::HANDLER_ID, self.policy, envelope.event_id(), result)
    }
}
