//! Key/value and set storage for the derived state listeners invalidate.
//!
//! Listeners only see [`Cache`]; [`RedisCache`] backs it in production and
//! `InMemoryCache` in tests. Typed values go through [`CacheExt`]:
//!
//! ```rust,ignore
//! cache.set_json("friends:u1", &friend_ids, Some(3600)).await?;
//! let deleted = cache.delete_many(&["friends:u1".into()]).await?;
//! ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::shared::error::AppError;

/// Object safe, so listeners hold it as `Arc<dyn Cache>`; typed access goes
/// through [`CacheExt`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Cache: Send + Sync {
    /// Raw string value stored at `key`.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Store a raw string, with an optional time-to-live in seconds.
    async fn set_raw(&self, key: &str, value: &str, ttl_seconds: Option<u64>)
        -> Result<(), AppError>;

    /// Deletes a key; `true` if it existed.
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Deletes several keys in one round trip; returns how many existed.
    async fn delete_many(&self, keys: &[String]) -> Result<u64, AppError>;

    async fn exists(&self, key: &str) -> Result<bool, AppError>;

    /// Adds `member` to the set at `key`; `true` if it was not present.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, AppError>;

    /// Members of the set at `key` (unordered).
    async fn set_members(&self, key: &str) -> Result<Vec<String>, AppError>;

    /// Removes members from the set at `key`; returns how many were present.
    async fn set_remove(&self, key: &str, members: &[String]) -> Result<u64, AppError>;
}

/// JSON helpers on top of any [`Cache`].
#[async_trait]
pub trait CacheExt: Cache {
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.get_raw(key).await? {
            Some(data) => serde_json::from_str(&data).map(Some).map_err(|e| {
                warn!(key = %key, error = %e, "Failed to deserialize cached value");
                AppError::Serialization(e)
            }),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize + Sync + Send>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> Result<(), AppError> {
        let data = serde_json::to_string(value)?;
        self.set_raw(key, &data, ttl_seconds).await
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

/// [`Cache`] over a shared `ConnectionManager`; clones are cheap.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    /// Prepended verbatim to every key when set.
    prefix: Option<Arc<str>>,
}

impl RedisCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, prefix: None }
    }

    /// Namespaces every key, so several deployments can share one Redis.
    pub fn with_prefix(conn: ConnectionManager, prefix: impl Into<Arc<str>>) -> Self {
        Self {
            conn,
            prefix: Some(prefix.into()),
        }
    }

    fn format_key(&self, key: &str) -> String {
        format_key(self.prefix.as_deref(), key)
    }
}

fn format_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}{}", prefix, key),
        None => key.to_string(),
    }
}

#[async_trait]
impl Cache for RedisCache {
    #[instrument(skip(self), level = "debug")]
    async fn get_raw(&self, key: &str) -> Result<Option<String>, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let result: Option<String> = conn.get(&full_key).await?;
        debug!(key = %full_key, hit = result.is_some(), "Cache get");

        Ok(result)
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<(), AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        match ttl_seconds {
            Some(seconds) => {
                let _: () = conn.set_ex(&full_key, value, seconds).await?;
            }
            None => {
                let _: () = conn.set(&full_key, value).await?;
            }
        }
        debug!(key = %full_key, ttl = ?ttl_seconds, "Cache set");

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let deleted: u64 = conn.del(&full_key).await?;
        debug!(key = %full_key, deleted = deleted > 0, "Cache delete");

        Ok(deleted > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_many(&self, keys: &[String]) -> Result<u64, AppError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let full_keys: Vec<String> = keys.iter().map(|k| self.format_key(k)).collect();
        let mut conn = self.conn.clone();

        let deleted: u64 = conn.del(full_keys.as_slice()).await?;
        debug!(count = deleted, requested = keys.len(), "Cache delete many");

        Ok(deleted)
    }

    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let exists: bool = conn.exists(&full_key).await?;

        Ok(exists)
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let added: u64 = conn.sadd(&full_key, member).await?;

        Ok(added > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_members(&self, key: &str) -> Result<Vec<String>, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let members: Vec<String> = conn.smembers(&full_key).await?;

        Ok(members)
    }

    #[instrument(skip(self), level = "debug")]
    async fn set_remove(&self, key: &str, members: &[String]) -> Result<u64, AppError> {
        if members.is_empty() {
            return Ok(0);
        }

        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let removed: u64 = conn.srem(&full_key, members).await?;
        debug!(key = %full_key, removed, "Cache set remove");

        Ok(removed)
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_key_with_prefix() {
        assert_eq!(format_key(Some("chat:v1:"), "friends:u1"), "chat:v1:friends:u1");
    }

    #[test]
    fn test_format_key_without_prefix() {
        assert_eq!(format_key(None, "friends:u1"), "friends:u1");
    }
}
