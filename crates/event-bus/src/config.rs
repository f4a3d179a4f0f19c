//! Bus configuration from environment variables.

use crate::memory::InMemoryTransport;
use crate::publisher::PublisherConfig;
use crate::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use std::env;
use std::time::Duration;

/// Process-wide bus settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Producing service name stamped on published envelopes
    pub source: String,

    /// Broadcast attempts per publish
    pub max_retries: u32,

    /// Base pause between publish attempts
    pub retry_delay: Duration,

    /// Buffer size of the in-memory transport
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            source: "unknown-service".to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `EVENT_BUS_SOURCE`: Producing service name (default: unknown-service)
    /// - `EVENT_BUS_MAX_RETRIES`: Publish attempts (default: 3)
    /// - `EVENT_BUS_RETRY_DELAY_MS`: Base retry delay in ms (default: 500)
    /// - `EVENT_BUS_CHANNEL_CAPACITY`: In-memory buffer size (default: 1000)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            source: lookup("EVENT_BUS_SOURCE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.source),

            max_retries: lookup("EVENT_BUS_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),

            retry_delay: lookup("EVENT_BUS_RETRY_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),

            channel_capacity: lookup("EVENT_BUS_CHANNEL_CAPACITY")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.channel_capacity),
        }
    }

    /// Publisher settings derived from this configuration.
    #[must_use]
    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig::new(self.source.clone())
            .with_max_retries(self.max_retries)
            .with_retry_delay(self.retry_delay)
    }

    /// In-memory transport sized by this configuration.
    #[must_use]
    pub fn in_memory_transport(&self) -> InMemoryTransport {
        InMemoryTransport::with_capacity(self.channel_capacity)
    }
}
