//! # In-Memory Transport
//!
//! Single-process implementation of the transport port.
//!
//! Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
//! Every listener connection holds one receiver and keeps only messages on
//! the channels it listens to. Distributed deployments plug a networked
//! pub/sub system in behind the same traits.

use crate::error::{TransportError, TransportResult};
use crate::transport::{InboundMessage, ListenerConnection, OutboundMessage, Transport};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

struct Hub {
    /// Broadcast sender shared by every connection.
    sender: broadcast::Sender<InboundMessage>,

    /// Listening connection count by channel.
    listeners: RwLock<HashMap<String, usize>>,

    /// Serializes sends so a batch is never interleaved with other messages.
    send_lock: Mutex<()>,

    /// Flips to `true` when the transport is closed.
    shutdown: watch::Sender<bool>,

    /// Total messages handed to the broadcast channel.
    messages_sent: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl Hub {
    fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn listener_count(&self, channel: &str) -> usize {
        self.listeners.read().get(channel).copied().unwrap_or(0)
    }

    fn track(&self, channel: &str) {
        *self.listeners.write().entry(channel.to_string()).or_insert(0) += 1;
    }

    fn untrack(&self, channel: &str) {
        let mut listeners = self.listeners.write();
        let Some(count) = listeners.get_mut(channel) else {
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            listeners.remove(channel);
        }
    }

    fn send(&self, channel: &str, payload: String) {
        let message = InboundMessage {
            channel: channel.to_string(),
            payload,
        };
        // Only fails when no connection holds a receiver; nobody is listening
        // then and the message is dropped.
        if self.sender.send(message).is_ok() {
            self.messages_sent.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Broadcast transport living in process memory.
///
/// Clones share the same hub, so a publisher and a subscriber built from
/// clones of one transport talk to each other.
#[derive(Clone)]
pub struct InMemoryTransport {
    hub: Arc<Hub>,
}

impl InMemoryTransport {
    /// Create a new in-memory transport with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory transport with specified capacity.
    ///
    /// A listener falling more than `capacity` messages behind skips the
    /// oldest ones.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        let (shutdown, _) = watch::channel(false);
        Self {
            hub: Arc::new(Hub {
                sender,
                listeners: RwLock::new(HashMap::new()),
                send_lock: Mutex::new(()),
                shutdown,
                messages_sent: AtomicU64::new(0),
                capacity,
            }),
        }
    }

    /// Number of listening connections on `channel`.
    #[must_use]
    pub fn listener_count(&self, channel: &str) -> usize {
        self.hub.listener_count(channel)
    }

    /// Total messages handed to listeners so far.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.hub.messages_sent.load(Ordering::Relaxed)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.hub.capacity
    }

    /// Close the transport. Every command fails afterwards and every
    /// listener connection stops yielding messages.
    pub fn close(&self) {
        self.hub.shutdown.send_replace(true);
        debug!("In-memory transport closed");
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn broadcast(&self, channel: &str, payload: String) -> TransportResult<usize> {
        if self.hub.is_closed() {
            return Err(TransportError::Closed);
        }

        let _guard = self.hub.send_lock.lock();
        let listeners = self.hub.listener_count(channel);
        if listeners == 0 {
            warn!(channel = channel, "Message dropped (no listeners)");
            return Ok(0);
        }

        self.hub.send(channel, payload);
        debug!(channel = channel, listeners = listeners, "Message broadcast");
        Ok(listeners)
    }

    async fn broadcast_atomic(&self, messages: Vec<OutboundMessage>) -> TransportResult<()> {
        if self.hub.is_closed() {
            return Err(TransportError::Closed);
        }

        let _guard = self.hub.send_lock.lock();
        let count = messages.len();
        for message in messages {
            self.hub.send(&message.channel, message.payload);
        }
        debug!(messages = count, "Atomic batch broadcast");
        Ok(())
    }

    async fn ping(&self) -> TransportResult<()> {
        if self.hub.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    async fn duplicate(&self) -> TransportResult<Arc<dyn ListenerConnection>> {
        if self.hub.is_closed() {
            return Err(TransportError::Closed);
        }

        let (closed, _) = watch::channel(false);
        let listener = MemoryListener {
            stream: tokio::sync::Mutex::new(BroadcastStream::new(self.hub.sender.subscribe())),
            channels: RwLock::new(HashSet::new()),
            closed,
            hub: self.hub.clone(),
        };
        debug!("Listener connection opened");
        Ok(Arc::new(listener))
    }
}

/// Listening connection on an [`InMemoryTransport`].
///
/// When dropped, its channel registrations are released.
pub struct MemoryListener {
    /// Receiver side of the shared broadcast channel.
    stream: tokio::sync::Mutex<BroadcastStream<InboundMessage>>,

    /// Channels this connection listens on.
    channels: RwLock<HashSet<String>>,

    /// Flips to `true` when this connection is closed.
    closed: watch::Sender<bool>,

    hub: Arc<Hub>,
}

impl MemoryListener {
    fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.hub.is_closed()
    }

    fn release_all(&self) {
        let channels: Vec<String> = self.channels.write().drain().collect();
        for channel in &channels {
            self.hub.untrack(channel);
        }
    }
}

#[async_trait]
impl ListenerConnection for MemoryListener {
    async fn listen(&self, channels: &[&str]) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut listened = self.channels.write();
        for channel in channels {
            if listened.insert((*channel).to_string()) {
                self.hub.track(channel);
            }
        }
        debug!(channels = ?channels, "Listening");
        Ok(())
    }

    async fn unlisten(&self, channels: &[&str]) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut listened = self.channels.write();
        for channel in channels {
            if listened.remove(*channel) {
                self.hub.untrack(channel);
            }
        }
        debug!(channels = ?channels, "Stopped listening");
        Ok(())
    }

    async fn next_message(&self) -> Option<InboundMessage> {
        let mut closed = self.closed.subscribe();
        let mut shutdown = self.hub.shutdown.subscribe();
        let mut stream = self.stream.lock().await;

        loop {
            if self.is_closed() {
                return None;
            }

            tokio::select! {
                _ = closed.changed() => continue,
                _ = shutdown.changed() => continue,
                item = stream.next() => match item {
                    Some(Ok(message)) => {
                        if self.channels.read().contains(&message.channel) {
                            return Some(message);
                        }
                        // Not listening on this channel, keep waiting
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(count))) => {
                        debug!(lagged = count, "Listener lagged, some messages dropped");
                    }
                    None => return None,
                },
            }
        }
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.send_replace(true);
        self.release_all();
        debug!("Listener connection closed");
        Ok(())
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        self.release_all();
    }
}
