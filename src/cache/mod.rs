//! Vellum rendering cache.
//!
//! Two tiers sit in front of template rendering:
//!
//! - **L1 (compiled templates)**: process-local, keyed by template id and
//!   version, never expires on its own.
//! - **L2 (rendered pages)**: full page HTML in a key/value backend (memory or
//!   Redis), keyed by slug, with a TTL backstop.
//!
//! Writes never touch the tiers directly; they report a [`Mutation`] to the
//! [`InvalidationCoordinator`], which decides what to evict.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enable_template_cache = true
//! enable_page_cache = true
//! page_backend = "memory"   # or "redis"
//! page_ttl_secs = 900
//! # ... see config.rs for all options
//! ```

mod backend;
mod config;
mod coordinator;
mod keys;
mod lock;
mod pages;
mod redis_backend;
mod templates;

pub use backend::{MemoryPageBackend, PageCacheBackend, PageCacheError};
pub use config::{CacheConfig, PageBackendKind};
pub use coordinator::{
    InvalidationCoordinator, InvalidationPlan, InvalidationReport, L1Action, L2Action, Mutation,
};
pub use keys::{HOMEPAGE_SENTINEL, PageKey, TemplateKey, page_index_key, page_namespace};
pub use pages::PageCache;
pub use redis_backend::RedisPageBackend;
pub use templates::TemplateCache;
