//! # Transport Port
//!
//! The broadcast primitive the bus is built on. Any fire-and-forget pub/sub
//! system with per-channel addressing fits:
//!
//! - `broadcast` delivers to whoever listens on the channel right now;
//!   nobody listening means the message is gone.
//! - `broadcast_atomic` sends several messages as one buffered unit.
//! - Listening requires a dedicated connection obtained with `duplicate`,
//!   because a listening connection cannot issue other commands.

use crate::error::TransportResult;
use async_trait::async_trait;
use std::sync::Arc;

/// A message received on a listened channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: String,
    pub payload: String,
}

/// A message queued for an atomic batch send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: String,
    pub payload: String,
}

impl OutboundMessage {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Command side of a broadcast transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Broadcast `payload` on `channel`.
    ///
    /// # Returns
    ///
    /// The number of listeners the message reached; `0` is not an error.
    async fn broadcast(&self, channel: &str, payload: String) -> TransportResult<usize>;

    /// Broadcast every message in one buffered operation.
    async fn broadcast_atomic(&self, messages: Vec<OutboundMessage>) -> TransportResult<()>;

    /// Liveness probe.
    async fn ping(&self) -> TransportResult<()>;

    /// Open a second connection reserved for listening.
    async fn duplicate(&self) -> TransportResult<Arc<dyn ListenerConnection>>;
}

/// Listening side of a broadcast transport.
#[async_trait]
pub trait ListenerConnection: Send + Sync {
    /// Start receiving messages on the given channels.
    async fn listen(&self, channels: &[&str]) -> TransportResult<()>;

    /// Stop receiving messages on the given channels.
    async fn unlisten(&self, channels: &[&str]) -> TransportResult<()>;

    /// Wait for the next message on any listened channel.
    ///
    /// Returns `None` once the connection is closed.
    async fn next_message(&self) -> Option<InboundMessage>;

    /// Close the connection; pending and future `next_message` calls
    /// return `None`.
    async fn close(&self) -> TransportResult<()>;
}
