//! Block cache invalidation.
//!
//! A block or unblock changes block status, block lists, friend lists and the
//! blocker's conversation list. Deleting a key is safe to repeat, and a stale
//! cache is tolerated until the next read repopulates it, so failures are
//! swallowed by default.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::settle;
use crate::application::bus::{EventHandler, Handled};
use crate::application::services::{IdempotencyError, IdempotencyService};
use crate::config::FailurePolicy;
use crate::domain::events::block::{UserBlocked, UserUnblocked};
use crate::domain::events::{DomainEvent, EventEnvelope};
use crate::infrastructure::cache::{keys, Cache};

pub struct BlockCacheListener {
    idempotency: Arc<IdempotencyService>,
    cache: Arc<dyn Cache>,
    policy: FailurePolicy,
}

impl BlockCacheListener {
    pub const HANDLER_ID: &'static str = "block-cache-invalidation";
    pub const DEFAULT_POLICY: FailurePolicy = FailurePolicy::Lenient;

    pub fn new(
        idempotency: Arc<IdempotencyService>,
        cache: Arc<dyn Cache>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            idempotency,
            cache,
            policy,
        }
    }

    /// Keys derived from the block relation between `blocker_id` and `blocked_id`.
    pub fn invalidation_keys(blocker_id: &str, blocked_id: &str) -> Vec<String> {
        vec![
            keys::block_status(blocker_id, blocked_id),
            keys::block_status(blocked_id, blocker_id),
            keys::blocked_list(blocker_id),
            keys::blocked_by(blocked_id),
            keys::friend_list(blocker_id),
            keys::friend_list(blocked_id),
            keys::conversation_list(blocker_id),
        ]
    }

    async fn invalidate<E: DomainEvent>(
        &self,
        envelope: &EventEnvelope<E>,
        blocker_id: &str,
        blocked_id: &str,
    ) -> Result<Handled, IdempotencyError> {
        let keys = Self::invalidation_keys(blocker_id, blocked_id);

        let result = self
            .idempotency
            .run_for(envelope, Self::HANDLER_ID, || async {
                let deleted = self.cache.delete_many(&keys).await?;
                debug!(requested = keys.len(), deleted, "Block cache invalidated");
                Ok::<_, anyhow::Error>(deleted)
            })
            .await;

        settle(Self::HANDLER_ID, self.policy, envelope.event_id(), result)
    }
}

#[async_trait]
impl EventHandler<UserBlocked> for BlockCacheListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(&self, envelope: &EventEnvelope<UserBlocked>) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        self.invalidate(envelope, &event.blocker_id, &event.blocked_id)
            .await
    }
}

#[async_trait]
impl EventHandler<UserUnblocked> for BlockCacheListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(
        &self,
        envelope: &EventEnvelope<UserUnblocked>,
    ) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        self.invalidate(envelope, &event.blocker_id, &event.blocked_id)
            .await
    }
}
