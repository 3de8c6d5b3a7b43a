//! Session store port.
//!
//! Signed-in sessions live in the cache, one key per session plus a per-user
//! index. Auth events revoke them; revocation is a key delete, so repeating it
//! is harmless.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Cached session data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSession {
    pub user_id: String,
    pub session_id: String,
    pub device_info: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedSession {
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            device_info: None,
            created_at: Utc::now(),
            expires_at,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &CachedSession) -> Result<(), AppError>;

    /// Session ids currently indexed for a user, sorted.
    async fn active_sessions(&self, user_id: &str) -> Result<Vec<String>, AppError>;

    async fn revoke(&self, user_id: &str, session_id: &str) -> Result<bool, AppError>;

    /// Revoke every session of `user_id` except the ids in `keep`.
    async fn revoke_all(&self, user_id: &str, keep: &[String]) -> Result<u64, AppError>;
}
