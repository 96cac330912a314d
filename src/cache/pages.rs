//! Rendered-page cache (L2).
//!
//! Maps a [`PageKey`] to the full HTML of that page in an external key/value
//! backend. Every round trip is bounded by the configured timeout (a
//! namespace purge by its own, larger one) and is abandoned when the caller's
//! future is dropped. Read failures degrade to a
//! miss; invalidation failures are returned so the caller can report them.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, warn};

use super::backend::{PageCacheBackend, PageCacheError};
use super::config::CacheConfig;
use super::keys::{PageKey, page_namespace};

const METRIC_L2_HIT: &str = "vellum_l2_hit_total";
const METRIC_L2_MISS: &str = "vellum_l2_miss_total";
const METRIC_L2_ERROR: &str = "vellum_l2_error_total";

pub struct PageCache {
    enabled: bool,
    backend: Arc<dyn PageCacheBackend>,
    prefix: String,
    ttl: Duration,
    timeout: Duration,
    purge_timeout: Duration,
    /// Bumped by every invalidation; fills that straddle a bump are discarded.
    generation: AtomicU64,
}

impl PageCache {
    pub fn new(config: &CacheConfig, backend: Arc<dyn PageCacheBackend>) -> Self {
        Self {
            enabled: config.enable_page_cache,
            backend,
            prefix: config.key_prefix.clone(),
            ttl: config.page_ttl(),
            timeout: config.operation_timeout(),
            purge_timeout: config.purge_timeout(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.ttl
    }

    /// Snapshot to pass to [`PageCache::put_if_current`] once rendering is done.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn get(&self, key: &PageKey) -> Option<Bytes> {
        if !self.enabled {
            return None;
        }

        let storage_key = key.storage_key(&self.prefix);
        match self.bounded(self.backend.get(&storage_key)).await {
            Ok(Some(body)) => {
                counter!(METRIC_L2_HIT).increment(1);
                debug!(cache = "l2", outcome = "hit", page_key = %key);
                Some(body)
            }
            Ok(None) => {
                counter!(METRIC_L2_MISS).increment(1);
                debug!(cache = "l2", outcome = "miss", page_key = %key);
                None
            }
            Err(err) => {
                self.record_error("get", key, &err);
                counter!(METRIC_L2_MISS).increment(1);
                None
            }
        }
    }

    /// Store a page. Failures are logged and swallowed.
    pub async fn put(&self, key: &PageKey, body: Bytes, ttl: Duration) {
        if !self.enabled {
            return;
        }

        let storage_key = key.storage_key(&self.prefix);
        if let Err(err) = self.bounded(self.backend.set(&storage_key, body, ttl)).await {
            self.record_error("put", key, &err);
        }
    }

    /// Store a page rendered while the cache was at `observed` generation.
    ///
    /// If an invalidation ran in between, the page may have been rendered from
    /// data that is already stale, so it is not kept. Returns whether the
    /// entry was stored.
    pub async fn put_if_current(
        &self,
        key: &PageKey,
        body: Bytes,
        ttl: Duration,
        observed: u64,
    ) -> bool {
        if !self.enabled || self.generation() != observed {
            return false;
        }

        self.put(key, body, ttl).await;

        if self.generation() != observed {
            // An invalidation raced the write; take the entry back out.
            if let Err(err) = self.invalidate_key(key).await {
                self.record_error("put_if_current", key, &err);
            }
            return false;
        }
        true
    }

    /// Returns whether a stored page was evicted.
    pub async fn invalidate(&self, key: &PageKey) -> Result<bool, PageCacheError> {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if !self.enabled {
            return Ok(false);
        }
        self.invalidate_key(key).await
    }

    /// Remove every page under this cache's namespace. Returns how many were removed.
    pub async fn invalidate_all(&self) -> Result<u64, PageCacheError> {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if !self.enabled {
            return Ok(0);
        }
        let namespace = page_namespace(&self.prefix);
        within(self.purge_timeout, self.backend.delete_prefix(&namespace)).await
    }

    async fn invalidate_key(&self, key: &PageKey) -> Result<bool, PageCacheError> {
        let storage_key = key.storage_key(&self.prefix);
        self.bounded(self.backend.delete(&storage_key)).await
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, PageCacheError>>,
    ) -> Result<T, PageCacheError> {
        within(self.timeout, operation).await
    }

    fn record_error(&self, op: &'static str, key: &PageKey, err: &PageCacheError) {
        counter!(METRIC_L2_ERROR, "op" => op).increment(1);
        warn!(
            cache = "l2",
            op,
            page_key = %key,
            error = %err,
            "Page cache unavailable; continuing without it"
        );
    }
}

async fn within<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, PageCacheError>>,
) -> Result<T, PageCacheError> {
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| PageCacheError::Timeout(limit))?
}
