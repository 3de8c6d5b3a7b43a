//! Session revocation on auth events.
//!
//! A password change signs out every other device; a logout ends one session
//! (or all of them when no session id is given).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use super::settle;
use crate::application::bus::{EventHandler, Handled};
use crate::application::services::{IdempotencyError, IdempotencyService};
use crate::config::FailurePolicy;
use crate::domain::events::auth::{PasswordChanged, UserLoggedOut};
use crate::domain::events::EventEnvelope;
use crate::domain::SessionStore;

pub struct SessionInvalidationListener {
    idempotency: Arc<IdempotencyService>,
    sessions: Arc<dyn SessionStore>,
    policy: FailurePolicy,
}

impl SessionInvalidationListener {
    pub const HANDLER_ID: &'static str = "auth-session-invalidation";
    pub const DEFAULT_POLICY: FailurePolicy = FailurePolicy::Strict;

    pub fn new(
        idempotency: Arc<IdempotencyService>,
        sessions: Arc<dyn SessionStore>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            idempotency,
            sessions,
            policy,
        }
    }
}

#[async_trait]
impl EventHandler<PasswordChanged> for SessionInvalidationListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(
        &self,
        envelope: &EventEnvelope<PasswordChanged>,
    ) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();
        let keep: Vec<String> = event.current_session_id.iter().cloned().collect();

        let result = self
            .idempotency
            .run_for(envelope, Self::HANDLER_ID, || async {
                let revoked = self.sessions.revoke_all(&event.user_id, &keep).await?;
                info!(user_id = %event.user_id, revoked, "Sessions revoked after password change");
                Ok::<_, anyhow::Error>(revoked)
            })
            .await;

        settle(Self::HANDLER_ID, self.policy, envelope.event_id(), result)
    }
}

#[async_trait]
impl EventHandler<UserLoggedOut> for SessionInvalidationListener {
    fn handler_id(&self) -> &'static str {
        Self::HANDLER_ID
    }

    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id()))]
    async fn handle(&self, envelope: &EventEnvelope<UserLoggedOut>) -> Result<Handled, IdempotencyError> {
        let event = envelope.payload();

        let result = self
            .idempotency
            .run_for(envelope, Self::HANDLER_ID, || async {
                let revoked = match event.session_id.as_deref() {
                    Some(session_id) => {
                        u64::from(self.sessions.revoke(&event.user_id, session_id).await?)
                    }
                    None => self.sessions.revoke_all(&event.user_id, &[]).await?,
                };
                info!(user_id = %event.user_id, revoked, "Sessions revoked after logout");
                Ok::<_, anyhow::Error>(revoked)
            })
            .await;

        settle(Self::HANDLER_ID, self.policy, envelope.event_id(), result)
    }
}
