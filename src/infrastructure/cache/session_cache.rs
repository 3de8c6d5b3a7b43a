//! Session Cache
//!
//! Cache-based session storage: one JSON value per session and a per-user set
//! indexing the session ids.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use super::{keys, Cache, CacheExt};
use crate::domain::{CachedSession, SessionStore};
use crate::shared::error::AppError;

/// Session store over any [`Cache`] backend.
#[derive(Clone)]
pub struct CacheSessionStore {
    cache: Arc<dyn Cache>,
}

impl CacheSessionStore {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl SessionStore for CacheSessionStore {
    #[instrument(skip(self, session), fields(user_id = %session.user_id, session_id = %session.session_id))]
    async fn save(&self, session: &CachedSession) -> Result<(), AppError> {
        let ttl = (session.expires_at - Utc::now()).num_seconds();
        if ttl <= 0 {
            debug!("Session already expired, dropping it");
            self.revoke(&session.user_id, &session.session_id).await?;
            return Ok(());
        }

        self.cache
            .set_json(
                &keys::session(&session.user_id, &session.session_id),
                session,
                Some(ttl as u64),
            )
            .await?;
        self.cache
            .set_add(&keys::session_index(&session.user_id), &session.session_id)
            .await?;
        Ok(())
    }

    async fn active_sessions(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let mut ids = self.cache.set_members(&keys::session_index(user_id)).await?;
        ids.sort();
        Ok(ids)
    }

    #[instrument(skip(self))]
    async fn revoke(&self, user_id: &str, session_id: &str) -> Result<bool, AppError> {
        let existed = self.cache.delete(&keys::session(user_id, session_id)).await?;
        self.cache
            .set_remove(&keys::session_index(user_id), &[session_id.to_string()])
            .await?;
        debug!(existed, "Session revoked");
        Ok(existed)
    }

    #[instrument(skip(self))]
    async fn revoke_all(&self, user_id: &str, keep: &[String]) -> Result<u64, AppError> {
        let revoked: Vec<String> = self
            .active_sessions(user_id)
            .await?
            .into_iter()
            .filter(|id| !keep.contains(id))
            .collect();
        if revoked.is_empty() {
            return Ok(0);
        }

        let session_keys: Vec<String> = revoked
            .iter()
            .map(|id| keys::session(user_id, id))
            .collect();
        let deleted = self.cache.delete_many(&session_keys).await?;
        self.cache
            .set_remove(&keys::session_index(user_id), &revoked)
            .await?;

        debug!(deleted, kept = ?keep, "Sessions revoked");
        Ok(deleted)
    }
}
