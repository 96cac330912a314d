mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use metrics_util::debugging::DebuggingRecorder;
use serde_json::json;
use serial_test::serial;
use vellum::cache::{PageCacheBackend, PageCacheError};
use vellum::domain::types::BodyFormat;

use support::{install_site, publish, test_app, test_app_with};

struct UnreachableBackend;

#[async_trait]
impl PageCacheBackend for UnreachableBackend {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, PageCacheError> {
        Err(PageCacheError::backend("connection refused"))
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), PageCacheError> {
        Err(PageCacheError::backend("connection refused"))
    }

    async fn delete(&self, _key: &str) -> Result<bool, PageCacheError> {
        Err(PageCacheError::backend("connection refused"))
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<u64, PageCacheError> {
        Err(PageCacheError::backend("connection refused"))
    }
}

#[tokio::test]
#[serial]
async fn cache_and_render_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // L1 miss + compile, L2 miss, then hits on the second request.
    let harness = test_app();
    let app = &harness.app;
    install_site(app).await;
    publish(app, "measured", "Measured", "", BodyFormat::Html).await;
    app.site.page_by_slug("measured").await.unwrap();
    app.site.page_by_slug("measured").await.unwrap();
    app.site.homepage().await.unwrap();
    app.admin_state
        .templates
        .preview("{{ x }}", json!({"x": 1}))
        .unwrap();

    // A page cache that cannot be reached still serves pages.
    let degraded = test_app_with(Arc::new(UnreachableBackend));
    install_site(&degraded.app).await;
    publish(&degraded.app, "degraded", "Degraded", "", BodyFormat::Html).await;
    let served = degraded.app.site.page_by_slug("degraded").await.unwrap();
    assert!(served.is_some());

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "vellum_l1_hit_total",
        "vellum_l1_miss_total",
        "vellum_l1_compile_ms",
        "vellum_l2_hit_total",
        "vellum_l2_miss_total",
        "vellum_l2_error_total",
        "vellum_invalidation_total",
        "vellum_render_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
