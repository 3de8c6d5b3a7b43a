//! In-memory cache.
//!
//! Same semantics as the Redis cache minus expiry. Counts every call and
//! records deleted keys so tests can assert what a listener touched.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::infrastructure::cache::Cache;
use crate::shared::error::AppError;

#[derive(Debug, Default)]
pub struct InMemoryCache {
    values: RwLock<HashMap<String, String>>,
    sets: RwLock<HashMap<String, HashSet<String>>>,
    calls: AtomicUsize,
    deleted: Mutex<Vec<String>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cache operations performed so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every key passed to a delete, in call order.
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn remove_key(&self, key: &str) -> bool {
        self.deleted.lock().push(key.to_string());
        let value = self.values.write().remove(key).is_some();
        let set = self.sets.write().remove(key).is_some();
        value || set
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, AppError> {
        self.touch();
        Ok(self.values.read().get(key).cloned())
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        _ttl_seconds: Option<u64>,
    ) -> Result<(), AppError> {
        self.touch();
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        self.touch();
        Ok(self.remove_key(key))
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, AppError> {
        self.touch();
        Ok(keys.iter().filter(|key| self.remove_key(key)).count() as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        self.touch();
        Ok(self.values.read().contains_key(key) || self.sets.read().contains_key(key))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool, AppError> {
        self.touch();
        Ok(self
            .sets
            .write()
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, AppError> {
        self.touch();
        Ok(self
            .sets
            .read()
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> Result<u64, AppError> {
        self.touch();
        let mut sets = self.sets.write();
        let Some(set) = sets.get_mut(key) else {
            return Ok(0);
        };
        let removed = members.iter().filter(|m| set.remove(*m)).count() as u64;
        if set.is_empty() {
            sets.remove(key);
        }
        Ok(removed)
    }
}
