//! Redis-backed page storage for deployments that share one cache between
//! several server processes.
//!
//! Every stored page key is also recorded in a per-namespace index set, so a
//! namespace purge costs one round trip per batch of *our* keys instead of a
//! `SCAN` over the whole shared keyspace.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tokio::sync::OnceCell;
use tracing::info;

use super::backend::{PageCacheBackend, PageCacheError};
use super::keys::page_index_key;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const CONNECT_RETRIES: usize = 2;
const UNLINK_BATCH: usize = 500;

impl From<redis::RedisError> for PageCacheError {
    fn from(err: redis::RedisError) -> Self {
        PageCacheError::backend(err)
    }
}

/// The connection is opened on first use. A Redis that is down at startup
/// only makes page-cache calls fail (and read as misses) until it comes back.
pub struct RedisPageBackend {
    client: Client,
    manager: OnceCell<ConnectionManager>,
    index_key: String,
}

impl RedisPageBackend {
    /// Parses `url` without connecting.
    pub fn new(url: &str, key_prefix: &str) -> Result<Self, PageCacheError> {
        Ok(Self {
            client: Client::open(url)?,
            manager: OnceCell::new(),
            index_key: page_index_key(key_prefix),
        })
    }

    pub async fn ping(&self) -> Result<(), PageCacheError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// `ConnectionManager` reconnects transparently once established and is
    /// cheap to clone, so every operation works on its own handle. A failed
    /// first connect leaves the cell empty and the next call tries again.
    async fn connection(&self) -> Result<ConnectionManager, PageCacheError> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(CONNECT_RETRIES)
                    .set_connection_timeout(CONNECT_TIMEOUT);
                let manager =
                    ConnectionManager::new_with_config(self.client.clone(), config).await?;
                info!(target = "cache::redis", "Connected to page cache");
                Ok::<_, redis::RedisError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl PageCacheBackend for RedisPageBackend {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, PageCacheError> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), PageCacheError> {
        let mut conn = self.connection().await?;
        // SET EX rejects zero; one second is the smallest expiry Redis accepts.
        let seconds = ttl.as_secs().max(1);
        let _: () = redis::pipe()
            .atomic()
            .set_ex(key, value.as_ref(), seconds)
            .ignore()
            .sadd(&self.index_key, key)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, PageCacheError> {
        let mut conn = self.connection().await?;
        let (removed,): (u64,) = redis::pipe()
            .atomic()
            .del(key)
            .srem(&self.index_key, key)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, PageCacheError> {
        let mut conn = self.connection().await?;

        // Take the index in one step; pages stored after this land in a fresh set.
        let (members,): (Vec<String>,) = redis::pipe()
            .atomic()
            .smembers(&self.index_key)
            .del(&self.index_key)
            .ignore()
            .query_async(&mut conn)
            .await?;

        let (doomed, kept) = split_by_prefix(members, prefix);
        if !kept.is_empty() {
            let _: () = conn.sadd(&self.index_key, &kept).await?;
        }

        let mut removed: u64 = 0;
        for batch in doomed.chunks(UNLINK_BATCH) {
            let unlinked: u64 = conn.unlink(batch).await?;
            removed += unlinked;
        }
        Ok(removed)
    }
}

fn split_by_prefix(keys: Vec<String>, prefix: &str) -> (Vec<String>, Vec<String>) {
    keys.into_iter().partition(|key| key.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_lives_outside_the_page_namespace() {
        let backend = RedisPageBackend::new("redis://127.0.0.1:6379/", "vellum:").unwrap();
        assert_eq!(backend.index_key, "vellum:page-index");
        assert!(!backend.index_key.starts_with("vellum:page:"));
    }

    #[test]
    fn purge_only_takes_keys_under_the_prefix() {
        let keys = vec![
            "vellum:page:a".to_string(),
            "vellum:page:__home__".to_string(),
            "other:page:a".to_string(),
        ];
        let (doomed, kept) = split_by_prefix(keys, "vellum:page:");
        assert_eq!(doomed, ["vellum:page:a", "vellum:page:__home__"]);
        assert_eq!(kept, ["other:page:a"]);
    }

    #[test]
    fn malformed_url_is_rejected_without_connecting() {
        assert!(RedisPageBackend::new("not a url", "vellum:").is_err());
    }

    #[tokio::test]
    async fn unreachable_server_fails_fast() {
        let backend = RedisPageBackend::new("redis://127.0.0.1:1/", "vellum:").unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(10), backend.get("k"))
            .await
            .expect("connect attempts are bounded");
        assert!(matches!(outcome, Err(PageCacheError::Backend(_))));
    }
}
