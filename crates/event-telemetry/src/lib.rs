//! # Event Telemetry
//!
//! Observability for services on the domain event bus.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` registry with env filtering and
//!   pretty or JSON output
//! - **Metrics**: Prometheus counters and histograms for publishing,
//!   dispatch and dead-lettering
//!
//! ## Usage
//!
//! ```rust,ignore
//! use event_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//!     // publish and subscribe
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `EVENT_BUS_SERVICE_NAME` | `event-bus` | Service name in logs |
//! | `EVENT_BUS_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honored) |
//! | `EVENT_BUS_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `EVENT_BUS_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging, LoggingHandle};
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, DEAD_LETTERED,
    DECODE_FAILURES, DISPATCH_DURATION, EVENTS_PUBLISHED, EVENTS_RECEIVED, HANDLER_ERRORS,
    PUBLISH_FAILURES, PUBLISH_RETRIES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first; they need no global subscriber
    let metrics_handle = register_metrics()?;
    let logging_handle = init_logging(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
        _logging: logging_handle,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
    _logging: LoggingHandle,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Increment a counter, optionally selecting label values.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

/// Start timing a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
    ($histogram:expr, $labels:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram.with_label_values($labels))
    };
}
