//! Wiring of stores, caches, services, and router states.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::admin::{AdminContentService, AdminTemplateService};
use crate::application::render::{ComrakMarkdown, RenderPipeline};
use crate::application::repos::{ContentStore, InvalidationLog, TemplateStore};
use crate::application::site::SiteService;
use crate::cache::{
    CacheConfig, InvalidationCoordinator, MemoryPageBackend, PageBackendKind, PageCache,
    PageCacheBackend, RedisPageBackend, TemplateCache,
};
use crate::config::SiteSettings;
use crate::infra::db::PostgresRepositories;
use crate::infra::error::InfraError;
use crate::infra::http::{AdminState, HttpState};
use crate::infra::memory::MemoryRepositories;

/// The three persistence seams plus the pool handle used for health checks.
#[derive(Clone)]
pub struct Stores {
    pub templates: Arc<dyn TemplateStore>,
    pub contents: Arc<dyn ContentStore>,
    pub invalidations: Arc<dyn InvalidationLog>,
    pub db: Option<Arc<PostgresRepositories>>,
}

impl Stores {
    pub fn memory(repos: Arc<MemoryRepositories>) -> Self {
        Self {
            templates: repos.clone(),
            contents: repos.clone(),
            invalidations: repos,
            db: None,
        }
    }

    pub fn postgres(repos: Arc<PostgresRepositories>) -> Self {
        Self {
            templates: repos.clone(),
            contents: repos.clone(),
            invalidations: repos.clone(),
            db: Some(repos),
        }
    }
}

/// Open the configured page-cache backend.
///
/// Only a bad configuration is fatal. A Redis server that cannot be reached
/// within the operation timeout is logged and the backend is returned anyway;
/// the page cache then reads as a miss until the server answers.
pub async fn page_backend(config: &CacheConfig) -> Result<Arc<dyn PageCacheBackend>, InfraError> {
    match config.page_backend {
        PageBackendKind::Memory => Ok(Arc::new(MemoryPageBackend::new(config))),
        PageBackendKind::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| InfraError::configuration("cache.redis_url is not configured"))?;
            let backend = RedisPageBackend::new(url, &config.key_prefix)
                .map_err(|err| InfraError::configuration(format!("cache.redis_url: {err}")))?;

            match tokio::time::timeout(config.operation_timeout(), backend.ping()).await {
                Ok(Ok(())) => info!(target = "cache::redis", "Page cache reachable"),
                Ok(Err(err)) => warn!(
                    target = "cache::redis",
                    error = %err,
                    "Page cache unreachable; serving uncached until it recovers"
                ),
                Err(_) => warn!(
                    target = "cache::redis",
                    timeout_ms = config.operation_timeout_ms,
                    "Page cache did not answer; serving uncached until it recovers"
                ),
            }
            Ok(Arc::new(backend))
        }
    }
}

pub struct Application {
    pub template_cache: Arc<TemplateCache>,
    pub page_cache: Arc<PageCache>,
    pub coordinator: Arc<InvalidationCoordinator>,
    pub pipeline: Arc<RenderPipeline>,
    pub site: Arc<SiteService>,
    pub http_state: HttpState,
    pub admin_state: AdminState,
}

impl Application {
    pub fn assemble(
        stores: Stores,
        backend: Arc<dyn PageCacheBackend>,
        cache: &CacheConfig,
        site: &SiteSettings,
    ) -> Self {
        let template_cache = Arc::new(TemplateCache::new(cache.enable_template_cache));
        let page_cache = Arc::new(PageCache::new(cache, backend));

        let coordinator = Arc::new(InvalidationCoordinator::new(
            template_cache.clone(),
            page_cache.clone(),
            stores.invalidations.clone(),
        ));

        let pipeline = Arc::new(RenderPipeline::new(
            stores.templates.clone(),
            template_cache.clone(),
            Arc::new(ComrakMarkdown::new()),
            site.site_name.clone(),
        ));

        let site_service = Arc::new(SiteService::new(
            stores.contents.clone(),
            pipeline.clone(),
            page_cache.clone(),
            site.homepage_size,
        ));

        let admin_templates = Arc::new(AdminTemplateService::new(
            stores.templates.clone(),
            pipeline.clone(),
            coordinator.clone(),
        ));
        let admin_contents = Arc::new(AdminContentService::new(
            stores.contents.clone(),
            coordinator.clone(),
        ));

        let http_state = HttpState {
            site: site_service.clone(),
            page_ttl: cache.page_ttl(),
            db: stores.db.clone(),
        };

        let admin_state = AdminState {
            templates: admin_templates,
            contents: admin_contents,
            coordinator: coordinator.clone(),
            invalidations: stores.invalidations,
            db: stores.db,
        };

        Self {
            template_cache,
            page_cache,
            coordinator,
            pipeline,
            site: site_service,
            http_state,
            admin_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use bytes::Bytes;

    use super::*;
    use crate::cache::PageKey;

    fn unreachable_redis() -> CacheConfig {
        CacheConfig {
            page_backend: PageBackendKind::Redis,
            redis_url: Some("redis://127.0.0.1:1/".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn unreachable_redis_starts_with_an_always_miss_cache() {
        let config = unreachable_redis();
        let started = Instant::now();

        let backend = page_backend(&config)
            .await
            .expect("an unreachable page cache is not fatal");
        assert!(started.elapsed() < Duration::from_secs(5));

        let cache = PageCache::new(&config, backend);
        let key = PageKey::for_slug("hello");
        cache.put(&key, Bytes::from("<p>hi</p>"), config.page_ttl()).await;
        assert!(cache.get(&key).await.is_none());
        assert!(cache.invalidate_all().await.is_err());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn malformed_redis_url_is_a_configuration_error() {
        let config = CacheConfig {
            redis_url: Some("not a url".to_string()),
            ..unreachable_redis()
        };
        let err = page_backend(&config).await.err().expect("bad url rejected");
        assert!(err.to_string().contains("cache.redis_url"));
    }
}
