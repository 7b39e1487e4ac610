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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "waymark_sitemap_cache_hit_total",
            Unit::Count,
            "Sitemap documents served from cache."
        );
        describe_counter!(
            "waymark_sitemap_cache_miss_total",
            Unit::Count,
            "Sitemap documents rebuilt because no fresh entry was cached."
        );
        describe_counter!(
            "waymark_sitemap_cache_evict_total",
            Unit::Count,
            "Sitemap cache entries evicted due to capacity."
        );
        describe_counter!(
            "waymark_cache_invalidated_keys_total",
            Unit::Count,
            "Sitemap cache entries removed by invalidation."
        );
        describe_counter!(
            "waymark_redirect_hit_total",
            Unit::Count,
            "Requests answered by a redirect rule."
        );
        describe_histogram!(
            "waymark_sitemap_render_ms",
            Unit::Milliseconds,
            "Sitemap document render latency in milliseconds."
        );
    });
}
