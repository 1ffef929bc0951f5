use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::metric_names;
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
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

/// Register descriptions for every metric the cache emits. Safe to call repeatedly.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            metric_names::CACHE_HIT,
            Unit::Count,
            "Total number of query cache hits."
        );
        describe_counter!(
            metric_names::CACHE_MISS,
            Unit::Count,
            "Total number of query cache misses, including expired entries."
        );
        describe_counter!(
            metric_names::CACHE_EVICT,
            Unit::Count,
            "Total number of query cache evictions, labelled by reason."
        );
        describe_counter!(
            metric_names::CACHE_STALE_MARKED,
            Unit::Count,
            "Total number of cache entries marked stale by invalidation."
        );
        describe_gauge!(
            metric_names::EVENT_QUEUE_LEN,
            Unit::Count,
            "Current number of pending mutation events in the queue."
        );
        describe_counter!(
            metric_names::EVENT_DROPPED,
            Unit::Count,
            "Total number of mutation events dropped due to queue overflow."
        );
        describe_histogram!(
            metric_names::CONSUME_MS,
            Unit::Milliseconds,
            "Mutation event consumption latency in milliseconds."
        );
    });
}
