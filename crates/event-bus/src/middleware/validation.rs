//! Envelope sanity checks before anything else runs.

use super::{Middleware, Next};
use crate::error::{BusError, BusResult};
use async_trait::async_trait;
use event_types::EventEnvelope;
use tracing::warn;

/// Rejects envelopes missing a mandatory field.
///
/// Topic and timestamp are typed and always present on an
/// [`EventEnvelope`]; the id, source and data are checked here. A rejected
/// event never reaches the rest of the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationMiddleware;

impl ValidationMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// First mandatory field that is missing or empty.
    #[must_use]
    pub fn check(event: &EventEnvelope) -> Option<&'static str> {
        if event.event_id().is_nil() {
            return Some("eventId");
        }
        if event.source().trim().is_empty() {
            return Some("source");
        }
        if !event.has_data() {
            return Some("data");
        }
        None
    }
}

#[async_trait]
impl Middleware for ValidationMiddleware {
    async fn handle(&self, event: &EventEnvelope, next: Next<'_>) -> BusResult<()> {
        if let Some(field) = Self::check(event) {
            warn!(
                event_id = %event.event_id(),
                topic = %event.topic(),
                field = field,
                "Event failed validation"
            );
            return Err(BusError::ValidationFailed { field });
        }
        next.run().await
    }
}
