//! Redis-side storage for listener-owned derived state: cached friend lists,
//! conversation lists and profiles, the session index and the key scheme
//! they all share.
//!
//! ```text
//! listeners --> Cache (trait) --> RedisCache    --> ConnectionManager
//!                             \-> InMemoryCache
//! ```

mod cache_service;
mod session_cache;

pub use cache_service::{Cache, CacheExt, RedisCache};
pub use session_cache::CacheSessionStore;

#[cfg(test)]
pub use cache_service::MockCache;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// One `ConnectionManager` shared by the cache, the session store and the
/// notification sink; it reconnects on its own.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Creates a `RedisCache` on an existing connection, applying the
/// configured key prefix.
pub fn create_redis_cache(conn: ConnectionManager, settings: &RedisSettings) -> RedisCache {
    match settings.key_prefix.as_deref() {
        Some(prefix) if !prefix.is_empty() => RedisCache::with_prefix(conn, prefix),
        _ => RedisCache::new(conn),
    }
}

/// Cache key builders.
///
/// Use these to ensure consistent key naming between the writers of derived
/// state and the listeners that invalidate it.
pub mod keys {
    /// Prefix for pairwise block status (e.g., "block:status:u1:u2")
    pub const BLOCK_STATUS: &str = "block:status:";

    /// Prefix for the users someone blocked (e.g., "block:list:u1")
    pub const BLOCKED_LIST: &str = "block:list:";

    /// Prefix for the users who blocked someone (e.g., "block:by:u2")
    pub const BLOCKED_BY: &str = "block:by:";

    /// Prefix for friend lists (e.g., "friends:u1")
    pub const FRIEND_LIST: &str = "friends:";

    /// Prefix for conversation lists (e.g., "conversations:u1")
    pub const CONVERSATION_LIST: &str = "conversations:";

    /// Prefix for session data (e.g., "session:u1:s1")
    pub const USER_SESSION: &str = "session:";

    /// Prefix for a user's session index (e.g., "sessions:u1")
    pub const SESSION_INDEX: &str = "sessions:";

    /// Prefix for push notification channels
    pub const NOTIFICATION_CHANNEL: &str = "notifications:conversation:";

    #[inline]
    pub fn block_status(blocker_id: &str, blocked_id: &str) -> String {
        format!("{}{}:{}", BLOCK_STATUS, blocker_id, blocked_id)
    }

    #[inline]
    pub fn blocked_list(user_id: &str) -> String {
        format!("{}{}", BLOCKED_LIST, user_id)
    }

    #[inline]
    pub fn blocked_by(user_id: &str) -> String {
        format!("{}{}", BLOCKED_BY, user_id)
    }

    #[inline]
    pub fn friend_list(user_id: &str) -> String {
        format!("{}{}", FRIEND_LIST, user_id)
    }

    #[inline]
    pub fn conversation_list(user_id: &str) -> String {
        format!("{}{}", CONVERSATION_LIST, user_id)
    }

    #[inline]
    pub fn session(user_id: &str, session_id: &str) -> String {
        format!("{}{}:{}", USER_SESSION, user_id, session_id)
    }

    #[inline]
    pub fn session_index(user_id: &str) -> String {
        format!("{}{}", SESSION_INDEX, user_id)
    }

    #[inline]
    pub fn notification_channel(conversation_id: &str) -> String {
        format!("{}{}", NOTIFICATION_CHANNEL, conversation_id)
    }
}
