//! # Domain Event Bus Test Suite
//!
//! Cross-component scenarios that need a publisher, a subscriber and a
//! transport together.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Recording/flaky transports, log capture, sample events
//! │
//! └── integration/      # Scenarios across serializer, pipeline, publisher, subscriber
//!     ├── wire.rs
//!     ├── pipeline.rs
//!     ├── publishing.rs
//!     ├── consuming.rs
//!     └── choreography.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p event-bus-tests
//!
//! # By area
//! cargo test -p event-bus-tests integration::publishing::
//! ```

#![allow(dead_code)]

pub mod integration;
