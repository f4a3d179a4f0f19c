//! Prometheus metrics for the event bus.
//!
//! All metrics follow the naming convention: `event_bus_<metric>_<unit>`
//!
//! Metrics are usable as soon as they are first touched; registering them
//! only makes them visible to [`encode_metrics`].

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec,
    Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PUBLISHING
    // =========================================================================

    /// Events handed to the transport, by topic and producing service
    pub static ref EVENTS_PUBLISHED: CounterVec = CounterVec::new(
        Opts::new("event_bus_events_published_total", "Events successfully broadcast"),
        &["topic", "source"]
    ).expect("metric creation failed");

    /// Publishes that exhausted their retries
    pub static ref PUBLISH_FAILURES: CounterVec = CounterVec::new(
        Opts::new("event_bus_publish_failures_total", "Publishes that failed after all retries"),
        &["topic"]
    ).expect("metric creation failed");

    /// Transmission attempts beyond the first
    pub static ref PUBLISH_RETRIES: CounterVec = CounterVec::new(
        Opts::new("event_bus_publish_retries_total", "Broadcast attempts that were retries"),
        &["topic"]
    ).expect("metric creation failed");

    // =========================================================================
    // CONSUMING
    // =========================================================================

    /// Inbound messages that decoded into an envelope
    pub static ref EVENTS_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("event_bus_events_received_total", "Events received and decoded"),
        &["topic"]
    ).expect("metric creation failed");

    /// Inbound messages rejected by the decoder
    pub static ref DECODE_FAILURES: Counter = Counter::new(
        "event_bus_decode_failures_total",
        "Inbound messages that could not be decoded"
    ).expect("metric creation failed");

    /// Handler invocations that returned an error
    pub static ref HANDLER_ERRORS: CounterVec = CounterVec::new(
        Opts::new("event_bus_handler_errors_total", "Handler invocations that failed"),
        &["topic"]
    ).expect("metric creation failed");

    /// Time spent dispatching one inbound event to all of its handlers
    pub static ref DISPATCH_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "event_bus_dispatch_duration_seconds",
            "Time spent dispatching an event to its handlers"
        ).buckets(exponential_buckets(0.0005, 2.0, 14).unwrap()),
        &["topic"]
    ).expect("metric creation failed");

    // =========================================================================
    // MIDDLEWARE
    // =========================================================================

    /// Events whose processing error was swallowed by the dead-letter layer
    pub static ref DEAD_LETTERED: CounterVec = CounterVec::new(
        Opts::new("event_bus_dead_lettered_total", "Events routed to a dead-letter callback"),
        &["topic"]
    ).expect("metric creation failed");
}

/// Handle on the registry holding the bus metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Metrics that are already registered are skipped, so calling this more
/// than once is harmless.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Publishing
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(PUBLISH_FAILURES.clone()),
        Box::new(PUBLISH_RETRIES.clone()),
        // Consuming
        Box::new(EVENTS_RECEIVED.clone()),
        Box::new(DECODE_FAILURES.clone()),
        Box::new(HANDLER_ERRORS.clone()),
        Box::new(DISPATCH_DURATION.clone()),
        // Middleware
        Box::new(DEAD_LETTERED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
