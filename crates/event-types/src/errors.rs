//! # Error Types
//!
//! Errors raised while interpreting registry values.

use thiserror::Error;

/// A string that is not a member of the topic registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown topic: {0}")]
pub struct UnknownTopic(pub String);
