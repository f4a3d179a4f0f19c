//! Turn downstream failures into a callback.

use super::{Middleware, Next};
use crate::error::{BusError, BusResult};
use async_trait::async_trait;
use event_telemetry::{metric_inc, DEAD_LETTERED};
use event_types::EventEnvelope;
use std::sync::Arc;
use tracing::warn;

/// Receives the original event and the error that ended its processing.
pub type DeadLetterCallback = Arc<dyn Fn(&EventEnvelope, &BusError) + Send + Sync>;

/// Swallows downstream errors after handing them to `on_dead_letter`.
///
/// Upstream layers see a success once an event has been dead-lettered.
#[derive(Clone)]
pub struct DeadLetterMiddleware {
    on_dead_letter: DeadLetterCallback,
}

impl DeadLetterMiddleware {
    pub fn new<F>(on_dead_letter: F) -> Self
    where
        F: Fn(&EventEnvelope, &BusError) + Send + Sync + 'static,
    {
        Self {
            on_dead_letter: Arc::new(on_dead_letter),
        }
    }
}

#[async_trait]
impl Middleware for DeadLetterMiddleware {
    async fn handle(&self, event: &EventEnvelope, next: Next<'_>) -> BusResult<()> {
        let Err(err) = next.run().await else {
            return Ok(());
        };

        warn!(
            event_id = %event.event_id(),
            topic = %event.topic(),
            error = %err,
            "Event dead-lettered"
        );
        metric_inc!(DEAD_LETTERED, &[event.topic().as_str()]);
        (self.on_dead_letter)(event, &err);
        Ok(())
    }
}
