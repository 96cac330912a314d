//! Cache configuration.
//!
//! Controls the compiled-template cache and the rendered-page cache via
//! the `[cache]` table of `vellum.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_KEY_PREFIX: &str = "vellum:";
const DEFAULT_PAGE_TTL_SECS: u64 = 900;
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 250;
const DEFAULT_PURGE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MEMORY_PAGE_LIMIT: usize = 1024;

/// Where rendered pages are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageBackendKind {
    /// Process-local LRU; suitable for a single instance and for tests.
    #[default]
    Memory,
    /// Shared Redis instance reachable at `redis_url`.
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the in-process compiled-template cache.
    pub enable_template_cache: bool,
    /// Enable the rendered-page cache.
    pub enable_page_cache: bool,
    pub page_backend: PageBackendKind,
    pub redis_url: Option<String>,
    /// Namespace for every page key written to the backend.
    pub key_prefix: String,
    /// Safety-net expiry for rendered pages. Explicit invalidation is authoritative.
    pub page_ttl_secs: u64,
    /// Upper bound on a single page-cache round trip.
    pub operation_timeout_ms: u64,
    /// Upper bound on a namespace-wide purge, which touches every stored page.
    pub purge_timeout_ms: u64,
    /// Capacity of the memory page backend.
    pub memory_page_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_template_cache: true,
            enable_page_cache: true,
            page_backend: PageBackendKind::Memory,
            redis_url: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            page_ttl_secs: DEFAULT_PAGE_TTL_SECS,
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            purge_timeout_ms: DEFAULT_PURGE_TIMEOUT_MS,
            memory_page_limit: DEFAULT_MEMORY_PAGE_LIMIT,
        }
    }
}

impl CacheConfig {
    pub fn page_ttl(&self) -> Duration {
        Duration::from_secs(self.page_ttl_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn purge_timeout(&self) -> Duration {
        Duration::from_millis(self.purge_timeout_ms)
    }

    /// Returns the memory page limit as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_page_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_page_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enable_template_cache);
        assert!(config.enable_page_cache);
        assert_eq!(config.page_backend, PageBackendKind::Memory);
        assert_eq!(config.key_prefix, "vellum:");
        assert_eq!(config.page_ttl(), Duration::from_secs(900));
        assert_eq!(config.operation_timeout(), Duration::from_millis(250));
        assert_eq!(config.purge_timeout(), Duration::from_secs(5));
        assert_eq!(config.memory_page_limit, 1024);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            memory_page_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.memory_page_limit_non_zero().get(), 1);
    }
}
