//! # Domain Listeners
//!
//! One listener per module concern. Every listener runs its side effects
//! through the [`IdempotencyService`] under its own handler id, so each has
//! an independent ledger track per event.
//!
//! | Handler id | Events | Default policy |
//! |---|---|---|
//! | `block-cache-invalidation` | UserBlocked, UserUnblocked | lenient |
//! | `friendship-block-cleanup` | UserBlocked | strict |
//! | `conversation-system-messages` | ConversationCreated, member added/left/removed | strict |
//! | `conversation-membership` | ConversationCreated, member added/left/removed | strict |
//! | `message-conversation-state` | MessageSent, MessageDeleted | strict |
//! | `message-push-notification` | MessageSent | lenient |
//! | `call-system-messages` | CallEnded, CallMissed | strict |
//! | `auth-session-invalidation` | PasswordChanged, UserLoggedOut | strict |

mod block_cache_listener;
mod call_system_message_listener;
mod conversation_membership_listener;
mod conversation_system_message_listener;
mod friendship_block_listener;
mod message_notification_listener;
mod message_state_listener;
mod session_invalidation_listener;

pub use block_cache_listener::BlockCacheListener;
pub use call_system_message_listener::CallSystemMessageListener;
pub use conversation_membership_listener::ConversationMembershipListener;
pub use conversation_system_message_listener::ConversationSystemMessageListener;
pub use friendship_block_listener::FriendshipBlockListener;
pub use message_notification_listener::MessageNotificationListener;
pub use message_state_listener::MessageStateListener;
pub use session_invalidation_listener::SessionInvalidationListener;

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::application::bus::{Handled, HandlerRegistry};
use crate::application::services::{IdempotencyError, IdempotencyService, IdempotentOutcome};
use crate::config::{FailurePolicy, ListenerSettings};
use crate::domain::events::auth::{PasswordChanged, UserLoggedOut};
use crate::domain::events::block::{UserBlocked, UserUnblocked};
use crate::domain::events::call::{CallEnded, CallMissed};
use crate::domain::events::conversation::{
    ConversationCreated, ConversationMemberAdded, ConversationMemberLeft,
    ConversationMemberRemoved,
};
use crate::domain::events::message::{MessageDeleted, MessageSent};
use crate::domain::services::NotificationSink;
use crate::domain::versioning::{RegistrationError, VersionRegistry};
use crate::domain::{
    ConversationStateRepository, FriendshipRepository, SessionStore, SystemMessageRepository,
};
use crate::infrastructure::cache::Cache;
use crate::infrastructure::metrics;

/// Map a wrapper result to a handler result under `policy`.
///
/// Lenient listeners log and swallow every failure; strict listeners hand it
/// to the dispatcher.
pub(crate) fn settle<T>(
    handler_id: &'static str,
    policy: FailurePolicy,
    event_id: Uuid,
    result: Result<IdempotentOutcome<T>, IdempotencyError>,
) -> Result<Handled, IdempotencyError> {
    match result {
        Ok(IdempotentOutcome::Executed(_)) => Ok(Handled::Executed),
        Ok(IdempotentOutcome::AlreadyProcessed) => Ok(Handled::AlreadyProcessed),
        Err(e) => match policy {
            FailurePolicy::Strict => Err(e),
            FailurePolicy::Lenient => {
                warn!(
                    handler_id,
                    %event_id,
                    error = %e,
                    "Non-critical listener failed, continuing"
                );
                metrics::record_handler_outcome(handler_id, "suppressed");
                Ok(Handled::Suppressed(e.to_string()))
            }
        },
    }
}

/// Collaborators the listeners write to.
#[derive(Clone)]
pub struct ListenerDeps {
    pub idempotency: Arc<IdempotencyService>,
    pub versions: Arc<VersionRegistry>,
    pub cache: Arc<dyn Cache>,
    pub friendships: Arc<dyn FriendshipRepository>,
    pub system_messages: Arc<dyn SystemMessageRepository>,
    pub conversation_state: Arc<dyn ConversationStateRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub notifications: Arc<dyn NotificationSink>,
}

/// Build every listener and subscribe it to each event type it handles.
pub fn register_all(
    registry: &mut HandlerRegistry,
    deps: &ListenerDeps,
    settings: &ListenerSettings,
) -> Result<(), RegistrationError> {
    let block_cache = Arc::new(BlockCacheListener::new(
        deps.idempotency.clone(),
        deps.cache.clone(),
        settings.policy_for(BlockCacheListener::HANDLER_ID, BlockCacheListener::DEFAULT_POLICY),
    ));
    registry.subscribe::<UserBlocked, _>(block_cache.clone())?;
    registry.subscribe::<UserUnblocked, _>(block_cache)?;

    let friendship = Arc::new(FriendshipBlockListener::new(
        deps.idempotency.clone(),
        deps.friendships.clone(),
        settings.policy_for(
            FriendshipBlockListener::HANDLER_ID,
            FriendshipBlockListener::DEFAULT_POLICY,
        ),
    ));
    registry.subscribe::<UserBlocked, _>(friendship)?;

    let conversation_messages = Arc::new(ConversationSystemMessageListener::new(
        deps.idempotency.clone(),
        deps.system_messages.clone(),
        settings.policy_for(
            ConversationSystemMessageListener::HANDLER_ID,
            ConversationSystemMessageListener::DEFAULT_POLICY,
        ),
    ));
    registry.subscribe::<ConversationCreated, _>(conversation_messages.clone())?;
    registry.subscribe::<ConversationMemberAdded, _>(conversation_messages.clone())?;
    registry.subscribe::<ConversationMemberLeft, _>(conversation_messages.clone())?;
    registry.subscribe::<ConversationMemberRemoved, _>(conversation_messages)?;

    let membership = Arc::new(ConversationMembershipListener::new(
        deps.idempotency.clone(),
        deps.conversation_state.clone(),
        settings.policy_for(
            ConversationMembershipListener::HANDLER_ID,
            ConversationMembershipListener::DEFAULT_POLICY,
        ),
    ));
    registry.subscribe::<ConversationCreated, _>(membership.clone())?;
    registry.subscribe::<ConversationMemberAdded, _>(membership.clone())?;
    registry.subscribe::<ConversationMemberLeft, _>(membership.clone())?;
    registry.subscribe::<ConversationMemberRemoved, _>(membership)?;

    let message_state = Arc::new(MessageStateListener::new(
        deps.idempotency.clone(),
        deps.conversation_state.clone(),
        settings.policy_for(
            MessageStateListener::HANDLER_ID,
            MessageStateListener::DEFAULT_POLICY,
        ),
    ));
    registry.subscribe::<MessageSent, _>(message_state.clone())?;
    registry.subscribe::<MessageDeleted, _>(message_state)?;

    let notification = Arc::new(MessageNotificationListener::new(
        deps.idempotency.clone(),
        deps.versions.clone(),
        deps.notifications.clone(),
        settings.policy_for(
            MessageNotificationListener::HANDLER_ID,
            MessageNotificationListener::DEFAULT_POLICY,
        ),
    ));
    registry.subscribe::<MessageSent, _>(notification)?;

    let call_messages = Arc::new(CallSystemMessageListener::new(
        deps.idempotency.clone(),
        deps.system_messages.clone(),
        settings.policy_for(
            CallSystemMessageListener::HANDLER_ID,
            CallSystemMessageListener::DEFAULT_POLICY,
        ),
    ));
    registry.subscribe::<CallEnded, _>(call_messages.clone())?;
    registry.subscribe::<CallMissed, _>(call_messages)?;

    let sessions = Arc::new(SessionInvalidationListener::new(
        deps.idempotency.clone(),
        deps.sessions.clone(),
        settings.policy_for(
            SessionInvalidationListener::HANDLER_ID,
            SessionInvalidationListener::DEFAULT_POLICY,
        ),
    ));
    registry.subscribe::<PasswordChanged, _>(sessions.clone())?;
    registry.subscribe::<UserLoggedOut, _>(sessions)?;

    info!(subscriptions = registry.len(), "Listeners registered");
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::IdempotencySettings;
    use crate::infrastructure::memory::InMemoryLedger;

    /// Wrapper over a fresh in-memory ledger with short waits.
    pub(crate) fn idempotency() -> (Arc<IdempotencyService>, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new());
        let settings = IdempotencySettings {
            max_wait_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            max_wait_ms: 20,
            ..IdempotencySettings::default()
        };
        (
            Arc::new(IdempotencyService::new(ledger.clone(), settings)),
            ledger,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::IdempotentOutcome;

    #[test]
    fn test_lenient_policy_swallows_failures() {
        let id = Uuid::now_v7();
        let failure = || {
            Err::<IdempotentOutcome<()>, _>(IdempotencyError::HandlerFailure {
                event_id: id,
                handler_id: "h".into(),
                message: "stale cache".into(),
            })
        };

        let handled = settle("h", FailurePolicy::Lenient, id, failure()).unwrap();
        assert!(matches!(handled, Handled::Suppressed(ref m) if m.contains("stale cache")));

        assert!(settle("h", FailurePolicy::Strict, id, failure()).is_err());
    }

    #[test]
    fn test_outcomes_map_to_handled() {
        let id = Uuid::now_v7();
        assert_eq!(
            settle("h", FailurePolicy::Strict, id, Ok(IdempotentOutcome::Executed(3))).unwrap(),
            Handled::Executed
        );
        assert_eq!(
            settle::<()>("h", FailurePolicy::Strict, id, Ok(IdempotentOutcome::AlreadyProcessed))
                .unwrap(),
            Handled::AlreadyProcessed
        );
    }
}
