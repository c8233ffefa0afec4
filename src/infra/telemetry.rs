use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
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
///
/// Logs go to stderr so `prewarm warm` can print its report on stdout.
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
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
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

/// Register metric descriptions with the installed recorder. Idempotent.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "prewarm_refresh_total",
            Unit::Count,
            "Refresh attempts by outcome (warm, error, timeout)."
        );
        describe_histogram!(
            "prewarm_refresh_ms",
            Unit::Milliseconds,
            "Latency of successful target refreshes in milliseconds."
        );
        describe_gauge!(
            "prewarm_refresh_in_flight",
            Unit::Count,
            "Refresh calls currently in flight across all runs."
        );
        describe_histogram!(
            "prewarm_run_ms",
            Unit::Milliseconds,
            "Wall-clock duration of warming runs in milliseconds, by source."
        );
        describe_counter!(
            "prewarm_event_log_fallback_total",
            Unit::Count,
            "Events written to the in-memory fallback after a primary append failed."
        );
        describe_counter!(
            "prewarm_event_skipped_total",
            Unit::Count,
            "Skip events recorded for unknown target ids."
        );
    });
}
