//! # Event Publisher
//!
//! The producing side of the bus.
//!
//! ```text
//! publish(data) ─► build_envelope ─► pipeline ─► encode ─► broadcast (retry)
//! publish_batch(items) ─► build_envelope × n ─► encode × n ─► broadcast_atomic
//! ```
//!
//! `publish_batch` skips the middleware pipeline and the retry loop: it is
//! the bulk path, one buffered transport call and nothing else.

use crate::error::{BusError, BusResult};
use crate::middleware::{linear_backoff, Pipeline, Terminal};
use crate::serializer::{build_envelope, encode};
use crate::transport::{OutboundMessage, Transport};
use crate::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use async_trait::async_trait;
use event_telemetry::{metric_inc, EVENTS_PUBLISHED, PUBLISH_FAILURES, PUBLISH_RETRIES};
use event_types::{EnvelopeOptions, EventData, EventEnvelope};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Trait for publishing events to the bus.
///
/// Services depend on this rather than on [`Publisher`] so tests can swap
/// in a recording double.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event.
    ///
    /// # Returns
    ///
    /// The id assigned to the event's envelope.
    async fn publish(&self, data: EventData, options: PublishOptions) -> BusResult<Uuid>;

    /// Publish several events in one transport operation, in order.
    async fn publish_batch(&self, events: Vec<BatchEvent>) -> BusResult<Vec<Uuid>>;

    /// Whether the transport currently answers.
    async fn health_check(&self) -> bool;
}

/// Construction parameters for a [`Publisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Producing service, stamped on every envelope.
    pub source: String,
    /// Broadcast attempts per publish.
    pub max_retries: u32,
    /// Base pause between attempts; attempt `n` waits `retry_delay * n`.
    pub retry_delay: Duration,
}

impl PublisherConfig {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// Per-call options for [`EventPublisher::publish`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishOptions {
    pub envelope: EnvelopeOptions,
    /// Pause once before the first broadcast attempt.
    pub delay: Option<Duration>,
}

impl PublishOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for an event triggered by `cause`.
    #[must_use]
    pub fn caused_by(cause: &EventEnvelope) -> Self {
        Self::new().with_envelope(EnvelopeOptions::caused_by(cause))
    }

    #[must_use]
    pub fn with_envelope(mut self, envelope: EnvelopeOptions) -> Self {
        self.envelope = envelope;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// One item of a batch publish.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEvent {
    pub data: EventData,
    pub options: EnvelopeOptions,
}

impl BatchEvent {
    pub fn new(data: impl Into<EventData>) -> Self {
        Self {
            data: data.into(),
            options: EnvelopeOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: EnvelopeOptions) -> Self {
        self.options = options;
        self
    }
}

/// Publisher bound to one transport and one source service.
pub struct Publisher {
    transport: Arc<dyn Transport>,
    source: String,
    pipeline: Pipeline,
    max_retries: u32,
    retry_delay: Duration,
}

impl Publisher {
    /// Create a publisher without middleware.
    pub fn new(transport: Arc<dyn Transport>, config: PublisherConfig) -> Self {
        Self {
            transport,
            source: config.source,
            pipeline: Pipeline::new(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        }
    }

    /// Run every `publish` through `pipeline`.
    #[must_use]
    pub fn with_middleware(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }
}

#[async_trait]
impl EventPublisher for Publisher {
    async fn publish(&self, data: EventData, options: PublishOptions) -> BusResult<Uuid> {
        let envelope = build_envelope(data, &self.source, &options.envelope)?;
        let transmit = Transmit {
            transport: self.transport.as_ref(),
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            delay: options.delay,
        };

        if self.pipeline.is_empty() {
            transmit.call(&envelope).await?;
        } else {
            self.pipeline.execute(&envelope, &transmit).await?;
        }
        Ok(envelope.event_id())
    }

    async fn publish_batch(&self, events: Vec<BatchEvent>) -> BusResult<Vec<Uuid>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(events.len());
        let mut messages = Vec::with_capacity(events.len());
        for event in events {
            let envelope = build_envelope(event.data, &self.source, &event.options)?;
            messages.push(OutboundMessage::new(envelope.topic().as_str(), encode(&envelope)));
            ids.push(envelope.event_id());
        }

        let topics: Vec<String> = messages.iter().map(|m| m.channel.clone()).collect();
        self.transport.broadcast_atomic(messages).await?;

        for topic in &topics {
            metric_inc!(EVENTS_PUBLISHED, &[topic.as_str(), self.source.as_str()]);
        }
        debug!(source = %self.source, count = ids.len(), "Batch published");
        Ok(ids)
    }

    async fn health_check(&self) -> bool {
        match self.transport.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(source = %self.source, error = %e, "Publisher health check failed");
                false
            }
        }
    }
}

/// Innermost publish step: encode and broadcast with retry.
struct Transmit<'a> {
    transport: &'a dyn Transport,
    max_retries: u32,
    retry_delay: Duration,
    delay: Option<Duration>,
}

#[async_trait]
impl<'a> Terminal for Transmit<'a> {
    async fn call(&self, event: &EventEnvelope) -> BusResult<()> {
        if let Some(delay) = self.delay.filter(|d| !d.is_zero()) {
            tokio::time::sleep(delay).await;
        }

        let topic = event.topic();
        let payload = encode(event);
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                metric_inc!(PUBLISH_RETRIES, &[topic.as_str()]);
            }

            match self.transport.broadcast(topic.as_str(), payload.clone()).await {
                Ok(receivers) => {
                    metric_inc!(EVENTS_PUBLISHED, &[topic.as_str(), event.source()]);
                    debug!(
                        event_id = %event.event_id(),
                        topic = %topic,
                        source = event.source(),
                        receivers = receivers,
                        attempt = attempt,
                        "Event published"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        event_id = %event.event_id(),
                        topic = %topic,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Broadcast failed"
                    );
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(linear_backoff(self.retry_delay, attempt)).await;
                    }
                }
            }
        }

        metric_inc!(PUBLISH_FAILURES, &[topic.as_str()]);
        error!(
            event_id = %event.event_id(),
            topic = %topic,
            "Event could not be published"
        );
        Err(match last_error {
            Some(e) => BusError::Transport(e),
            None => BusError::PublishFailed {
                event_id: event.event_id(),
                topic,
            },
        })
    }
}
