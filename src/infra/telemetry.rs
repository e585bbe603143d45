use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::metrics::{
    METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_MISS_TOTAL, METRIC_DISTRIBUTED_ERROR_TOTAL,
    METRIC_REFRESH_MS, METRIC_REFRESH_TOTAL, METRIC_SNAPSHOT_ENTRIES,
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

/// Console logging for embedders that asked the reader to log but installed
/// no subscriber of their own. Returns `false` when one was already present.
pub fn try_init_console() -> bool {
    init(&LoggingSettings::default()).is_ok()
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT_TOTAL,
            Unit::Count,
            "Total number of reads answered, labelled by the tier that answered."
        );
        describe_counter!(
            METRIC_CACHE_MISS_TOTAL,
            Unit::Count,
            "Total number of reads no tier could answer."
        );
        describe_counter!(
            METRIC_DISTRIBUTED_ERROR_TOTAL,
            Unit::Count,
            "Total number of failed distributed cache operations, labelled by operation."
        );
        describe_counter!(
            METRIC_REFRESH_TOTAL,
            Unit::Count,
            "Total number of snapshot refreshes, labelled by result."
        );
        describe_histogram!(
            METRIC_REFRESH_MS,
            Unit::Milliseconds,
            "Snapshot refresh latency in milliseconds."
        );
        describe_gauge!(
            METRIC_SNAPSHOT_ENTRIES,
            Unit::Count,
            "Number of entries in the current snapshot."
        );
    });
}
