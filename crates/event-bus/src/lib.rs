//! # Event Bus - Publish/Subscribe for Domain Events
//!
//! Thin layer over a shared broadcast transport that lets independent
//! services announce business events and react to each other's events
//! without direct calls.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Order svc    │                    │ Notification │
//! │  Publisher   │    publish()       │  Subscriber  │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Transport   │          │
//!                  │ (broadcast)  │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! ## Delivery
//!
//! - **Broadcast only:** a message published while nobody listens on its
//!   topic is lost. There is no replay and no acknowledgement.
//! - **Envelope everywhere:** every message is an `EventEnvelope` encoded by
//!   [`serializer`].
//! - **Shared middleware:** publishing and consuming both run through a
//!   [`middleware::Pipeline`].

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod error;
pub mod memory;
pub mod middleware;
pub mod publisher;
pub mod serializer;
pub mod subscriber;
pub mod transport;

#[cfg(test)]
mod testing;

use std::time::Duration;

pub use config::BusConfig;
pub use error::{BusError, BusResult, TransportError, TransportResult};
pub use memory::{InMemoryTransport, MemoryListener};
pub use middleware::{
    compose, DeadLetterMiddleware, LoggingMiddleware, Middleware, Next, Pipeline,
    RetryMiddleware, Terminal, ValidationMiddleware,
};
pub use publisher::{BatchEvent, EventPublisher, PublishOptions, Publisher, PublisherConfig};
pub use serializer::{build_envelope, decode, encode};
pub use subscriber::{
    handler_fn, ErrorCallback, EventHandler, Subscriber, SubscriberOptions, Subscription,
};
pub use transport::{InboundMessage, ListenerConnection, OutboundMessage, Transport};

pub use event_types::{EnvelopeOptions, EventData, EventEnvelope, Topic, TopicDomain};

/// Maximum messages buffered per listener before it starts skipping.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Broadcast attempts per publish.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base pause between publish attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
