//! Key-value stores behind the standings cache.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

/// Async key-value store with per-entry time to live
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: String, ttl: Duration);

    async fn delete(&self, key: &str);

    /// Delete every key starting with `prefix`, returning how many went
    async fn delete_prefix(&self, prefix: &str) -> usize;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process store; expiry is checked on read
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove expired entries
    pub async fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: drop it
        self.entries.write().await.remove(key);
        None
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn delete_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set("a", "1".to_string(), Duration::from_secs(60)).await;
        assert_eq!(store.get("a").await, Some("1".to_string()));
        store.delete("a").await;
        assert_eq!(store.get("a").await, None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_not_returned() {
        let store = MemoryStore::new();
        store.set("a", "1".to_string(), Duration::ZERO).await;
        assert_eq!(store.get("a").await, None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store.set("standings:1:bm", "x".to_string(), ttl).await;
        store.set("standings:1:mr", "y".to_string(), ttl).await;
        store.set("standings:2:bm", "z".to_string(), ttl).await;
        assert_eq!(store.delete_prefix("standings:1:").await, 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_evict_expired() {
        let store = MemoryStore::new();
        store.set("old", "1".to_string(), Duration::ZERO).await;
        store.set("new", "2".to_string(), Duration::from_secs(60)).await;
        assert_eq!(store.evict_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }
}
