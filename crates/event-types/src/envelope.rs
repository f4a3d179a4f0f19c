//! # Event Envelope
//!
//! The unit of transport. Every event on the bus travels inside exactly one
//! envelope:
//!
//! - **Identity**: `event_id` is a fresh UUID per event, never reused and
//!   never derived from content.
//! - **Routing**: `topic` selects the broadcast channel and the data shape.
//! - **Provenance**: `source` names the producing service, `timestamp` the
//!   creation instant.
//! - **Linkage**: `correlation_id` / `causation_id` tie an event to the
//!   request or event chain that triggered it.
//!
//! Envelopes are immutable once built; fields are only readable.

use crate::payloads::EventData;
use crate::topics::Topic;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Version assumed for `data` when the producer does not specify one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Open key/value bag for non-schematized context.
pub type Metadata = Map<String, Value>;

/// Canonical transport record wrapping one event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    event_id: Uuid,
    topic: Topic,
    version: String,
    timestamp: DateTime<Utc>,
    source: String,
    correlation_id: Option<String>,
    causation_id: Option<String>,
    metadata: Option<Metadata>,
    data: Value,
}

impl EventEnvelope {
    /// Assemble an envelope from already-validated parts.
    ///
    /// Producers go through the serializer's `build_envelope`, which assigns
    /// the id and timestamp; this constructor exists for decoders.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_parts(
        event_id: Uuid,
        topic: Topic,
        version: String,
        timestamp: DateTime<Utc>,
        source: String,
        correlation_id: Option<String>,
        causation_id: Option<String>,
        metadata: Option<Metadata>,
        data: Value,
    ) -> Self {
        Self {
            event_id,
            topic,
            version,
            timestamp,
            source,
            correlation_id,
            causation_id,
            metadata,
            data,
        }
    }

    #[must_use]
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    #[must_use]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    #[must_use]
    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Raw wire data. Its shape is trusted, not checked against the topic.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Interpret `data` as the shape registered for this envelope's topic.
    pub fn payload(&self) -> Result<EventData, serde_json::Error> {
        EventData::from_value(self.topic, self.data.clone())
    }

    /// Interpret `data` as an arbitrary type.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    /// Whether `data` carries anything. `null`, `false`, empty strings and
    /// empty objects or arrays do not.
    ///
    /// This is not loose truthiness: every number counts as data, `0`
    /// included, while `{}` and `[]` count as empty.
    #[must_use]
    pub fn has_data(&self) -> bool {
        match &self.data {
            Value::Null | Value::Bool(false) => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(fields) => !fields.is_empty(),
            Value::Bool(true) | Value::Number(_) => true,
        }
    }
}

/// Caller-supplied envelope fields. Anything left `None` is omitted from the
/// envelope rather than filled with a placeholder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvelopeOptions {
    pub version: Option<String>,
    pub correlation_id: Option<String>,
    pub causation_id: Option<String>,
    pub metadata: Option<Metadata>,
}

impl EnvelopeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for an event triggered by `cause`.
    ///
    /// The new event inherits the cause's correlation id (or adopts the
    /// cause's event id when it had none) and records the cause's event id as
    /// its causation id.
    #[must_use]
    pub fn caused_by(cause: &EventEnvelope) -> Self {
        let cause_id = cause.event_id().to_string();
        Self {
            correlation_id: Some(
                cause
                    .correlation_id()
                    .map_or_else(|| cause_id.clone(), str::to_string),
            ),
            causation_id: Some(cause_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    #[must_use]
    pub fn with_causation_id(mut self, causation_id: impl Into<String>) -> Self {
        self.causation_id = Some(causation_id.into());
        self
    }

    /// Add one metadata entry, creating the bag on first use.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Metadata::new)
            .insert(key.into(), value.into());
        self
    }
}
