//! Key/value storage behind the rendered-page cache.
//!
//! The page cache does not define a wire format of its own: anything that can
//! get, set-with-expiry, and delete byte blobs by key can back it.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use thiserror::Error;

use super::config::CacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::backend";

#[derive(Debug, Error)]
pub enum PageCacheError {
    #[error("page cache backend error: {0}")]
    Backend(String),
    #[error("page cache operation timed out after {0:?}")]
    Timeout(Duration),
}

impl PageCacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

#[async_trait]
pub trait PageCacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, PageCacheError>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), PageCacheError>;

    /// Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, PageCacheError>;

    /// Delete every key starting with `prefix`; returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, PageCacheError>;
}

struct MemoryEntry {
    value: Bytes,
    expires_at: Instant,
}

/// Process-local backend with LRU eviction and per-entry expiry.
pub struct MemoryPageBackend {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryPageBackend {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.memory_page_limit_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PageCacheBackend for MemoryPageBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, PageCacheError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), PageCacheError> {
        let entry = MemoryEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        mutex_lock(&self.entries, SOURCE, "set").put(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, PageCacheError> {
        let removed = mutex_lock(&self.entries, SOURCE, "delete").pop(key);
        Ok(removed.is_some_and(|entry| entry.expires_at > Instant::now()))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, PageCacheError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "delete_prefix");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        Ok(doomed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MemoryPageBackend {
        MemoryPageBackend::new(&CacheConfig::default())
    }

    #[tokio::test]
    async fn set_get_delete() {
        let backend = backend();
        let ttl = Duration::from_secs(60);

        assert!(backend.get("a").await.unwrap().is_none());
        backend.set("a", Bytes::from("one"), ttl).await.unwrap();
        assert_eq!(backend.get("a").await.unwrap(), Some(Bytes::from("one")));

        assert!(backend.delete("a").await.unwrap());
        assert!(backend.get("a").await.unwrap().is_none());
        assert!(!backend.delete("a").await.unwrap());
    }

    #[tokio::test]
    async fn expired_entries_miss() {
        let backend = backend();
        backend
            .set("a", Bytes::from("one"), Duration::ZERO)
            .await
            .unwrap();
        assert!(backend.get("a").await.unwrap().is_none());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn delete_prefix_only_touches_namespace() {
        let backend = backend();
        let ttl = Duration::from_secs(60);
        backend.set("ns:page:a", Bytes::new(), ttl).await.unwrap();
        backend.set("ns:page:b", Bytes::new(), ttl).await.unwrap();
        backend.set("other:page:a", Bytes::new(), ttl).await.unwrap();

        assert_eq!(backend.delete_prefix("ns:page:").await.unwrap(), 2);
        assert!(backend.get("ns:page:a").await.unwrap().is_none());
        assert!(backend.get("other:page:a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn lru_eviction_respects_capacity() {
        let backend = MemoryPageBackend::new(&CacheConfig {
            memory_page_limit: 2,
            ..Default::default()
        });
        let ttl = Duration::from_secs(60);
        backend.set("a", Bytes::new(), ttl).await.unwrap();
        backend.set("b", Bytes::new(), ttl).await.unwrap();
        backend.set("c", Bytes::new(), ttl).await.unwrap();

        assert!(backend.get("a").await.unwrap().is_none());
        assert_eq!(backend.len(), 2);
    }
}
