//! # Integration Scenarios
//!
//! - `wire`: serializer and envelope behavior seen from a consumer.
//! - `pipeline`: built-in middleware stacked around real publish/dispatch.
//! - `publishing`: retry, batch and lost-message behavior of the publisher.
//! - `consuming`: handler registry, isolation and decode failures.
//! - `choreography`: services reacting to each other's events.

pub mod choreography;
pub mod consuming;
