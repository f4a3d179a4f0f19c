//! Structured logging around the rest of the chain.

use super::{Middleware, Next};
use crate::error::BusResult;
use async_trait::async_trait;
use event_types::EventEnvelope;
use std::time::Instant;
use tracing::{error, info};

/// Logs the start, completion and failure of every event it sees.
///
/// Errors are logged and returned unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(&self, event: &EventEnvelope, next: Next<'_>) -> BusResult<()> {
        let start = Instant::now();
        info!(
            event_id = %event.event_id(),
            topic = %event.topic(),
            source = event.source(),
            "Processing event"
        );

        let result = next.run().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => info!(
                event_id = %event.event_id(),
                topic = %event.topic(),
                duration_ms = duration_ms,
                "Event processed"
            ),
            Err(e) => error!(
                event_id = %event.event_id(),
                topic = %event.topic(),
                duration_ms = duration_ms,
                error = %e,
                "Event processing failed"
            ),
        }
        result
    }
}
