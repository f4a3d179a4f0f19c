//! # Bus Errors
//!
//! One error type for everything the bus reports to callers and to the
//! subscriber's `on_error` callback.

use event_types::Topic;
use thiserror::Error;
use uuid::Uuid;

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Result type for transport primitives.
pub type TransportResult<T> = Result<T, TransportError>;

/// Failures raised by a broadcast transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport (or the connection) was closed.
    #[error("Transport closed")]
    Closed,

    /// The transport is temporarily unreachable.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// The transport refused a message on a channel.
    #[error("Transport rejected message on {channel}: {reason}")]
    Rejected { channel: String, reason: String },
}

/// Errors surfaced by the publisher, the subscriber and the middleware.
#[derive(Debug, Error)]
pub enum BusError {
    /// Inbound text is not a structurally valid envelope.
    #[error("Malformed event: {reason}")]
    MalformedEvent { reason: String },

    /// The validation middleware rejected an envelope field.
    #[error("Event validation failed: missing or empty {field}")]
    ValidationFailed { field: &'static str },

    /// A middleware continued the chain twice at the same position.
    #[error("next() called multiple times at middleware position {position}")]
    DoubleDispatch { position: usize },

    /// The transport failed to carry a message.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The retry loop ended without capturing an error.
    #[error("Failed to publish event {event_id} on {topic}")]
    PublishFailed { event_id: Uuid, topic: Topic },

    /// A consumer handler returned an error.
    #[error("Handler failed: {0}")]
    Handler(anyhow::Error),

    /// Typed payload (de)serialization failed.
    #[error("Payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),
}

impl BusError {
    /// Wrap any handler failure.
    pub fn handler(err: impl Into<anyhow::Error>) -> Self {
        Self::Handler(err.into())
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            reason: reason.into(),
        }
    }

    /// Short, stable label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedEvent { .. } => "malformed_event",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::DoubleDispatch { .. } => "double_dispatch",
            Self::Transport(_) => "transport",
            Self::PublishFailed { .. } => "publish_failed",
            Self::Handler(_) => "handler",
            Self::Payload(_) => "payload",
        }
    }
}
