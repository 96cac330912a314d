use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "vellum_l1_hit_total",
            Unit::Count,
            "Compiled-template cache hits."
        );
        describe_counter!(
            "vellum_l1_miss_total",
            Unit::Count,
            "Compiled-template cache misses."
        );
        describe_histogram!(
            "vellum_l1_compile_ms",
            Unit::Milliseconds,
            "Time spent compiling a stored template after an L1 miss."
        );
        describe_counter!(
            "vellum_l2_hit_total",
            Unit::Count,
            "Rendered-page cache hits."
        );
        describe_counter!(
            "vellum_l2_miss_total",
            Unit::Count,
            "Rendered-page cache misses, including reads that failed."
        );
        describe_counter!(
            "vellum_l2_error_total",
            Unit::Count,
            "Rendered-page cache operations that failed or timed out, by op."
        );
        describe_counter!(
            "vellum_invalidation_total",
            Unit::Count,
            "Invalidation coordinator runs, by coarsest scope touched."
        );
        describe_histogram!(
            "vellum_render_ms",
            Unit::Milliseconds,
            "Render pipeline latency in milliseconds, by kind."
        );
        describe_counter!(
            "vellum_cache_lock_poisoned_total",
            Unit::Count,
            "Poisoned cache locks recovered, by lock."
        );
    });
}
