use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::{
    catalog::METRIC_READ_REJECTED_TOTAL,
    jobs::{METRIC_CACHED_ITEMS, METRIC_REFRESH_MS, METRIC_REFRESH_TOTAL},
};
use crate::config::{LogFormat, LoggingSettings};

use super::{error::InfraError, http::METRIC_HTTP_REQUEST_MS};

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
            METRIC_REFRESH_TOTAL,
            Unit::Count,
            "Inventory refresh cycles by outcome."
        );
        describe_histogram!(
            METRIC_REFRESH_MS,
            Unit::Milliseconds,
            "Inventory refresh cycle latency in milliseconds."
        );
        describe_gauge!(
            METRIC_CACHED_ITEMS,
            Unit::Count,
            "Rows written by the last successful inventory refresh."
        );
        describe_counter!(
            METRIC_READ_REJECTED_TOTAL,
            Unit::Count,
            "Product reads refused because the cache was empty, stale or unreadable."
        );
        describe_histogram!(
            METRIC_HTTP_REQUEST_MS,
            Unit::Milliseconds,
            "HTTP request latency in milliseconds."
        );
    });
}
