//! # Event Types Crate
//!
//! Everything that defines *what* travels over the event bus:
//!
//! - [`topics`]: the closed topic registry, grouped by owning domain.
//! - [`payloads`]: one data shape per topic, unified as [`EventData`].
//! - [`envelope`]: the immutable [`EventEnvelope`] wrapping every event.
//!
//! ## Design Principles
//!
//! - **Closed vocabulary**: a topic outside the registry cannot be named.
//! - **One shape per topic**: the topic of a payload is derived from its
//!   variant, never passed alongside it.
//! - **Trusted data on decode**: envelopes carry `data` as JSON; typed access
//!   happens when a consumer asks for it.

pub mod envelope;
pub mod errors;
pub mod payloads;
pub mod topics;

pub use envelope::{EnvelopeOptions, EventEnvelope, Metadata, DEFAULT_VERSION};
pub use errors::UnknownTopic;
pub use payloads::EventData;
pub use topics::{Topic, TopicDomain};
