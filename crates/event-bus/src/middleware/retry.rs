//! Re-run the rest of the chain on failure.

use super::{Middleware, Next};
use crate::error::{BusError, BusResult};
use async_trait::async_trait;
use event_types::EventEnvelope;
use std::time::Duration;
use tracing::{debug, warn};

/// Retries downstream up to `max_attempts` times.
///
/// The pause before attempt `n + 1` is `delay * n` (linear backoff). When
/// every attempt fails, the last error is returned.
#[derive(Debug, Clone, Copy)]
pub struct RetryMiddleware {
    max_attempts: u32,
    delay: Duration,
}

impl RetryMiddleware {
    /// At least one attempt is always made.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Pause before the attempt after `attempt`: `delay * attempt`, saturating at
/// `Duration::MAX`.
pub(crate) fn linear_backoff(delay: Duration, attempt: u32) -> Duration {
    delay.checked_mul(attempt).unwrap_or(Duration::MAX)
}

impl Default for RetryMiddleware {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    async fn handle(&self, event: &EventEnvelope, next: Next<'_>) -> BusResult<()> {
        let mut attempt = 1;
        loop {
            let err: BusError = match next.run().await {
                Ok(()) => {
                    if attempt > 1 {
                        debug!(event_id = %event.event_id(), attempt = attempt, "Succeeded after retry");
                    }
                    return Ok(());
                }
                Err(e) => e,
            };

            if attempt >= self.max_attempts {
                warn!(
                    event_id = %event.event_id(),
                    topic = %event.topic(),
                    attempts = attempt,
                    error = %err,
                    "Retries exhausted"
                );
                return Err(err);
            }

            let wait = linear_backoff(self.delay, attempt);
            warn!(
                event_id = %event.event_id(),
                topic = %event.topic(),
                attempt = attempt,
                delay_ms = wait.as_millis() as u64,
                error = %err,
                "Attempt failed, retrying"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}
