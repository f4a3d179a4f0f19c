//! # Event Subscriber
//!
//! The consuming side of the bus.
//!
//! A subscriber owns two connections: the primary transport handle for
//! commands and health checks, and a dedicated listening connection. A
//! background task reads the listening connection and dispatches every
//! inbound message on its own task:
//!
//! ```text
//! listener ─► decode ─► handlers[topic] ─► pipeline ─► handler   (one at a time)
//!                │                                       │
//!                └── on_error(err, None, topic)           └── on_error(err, Some(event), topic)
//! ```
//!
//! Handlers for one message run in registration order and never see each
//! other's failures. Separate messages are dispatched concurrently.

use crate::error::{BusError, BusResult};
use crate::middleware::{Pipeline, Terminal};
use crate::serializer::decode;
use crate::transport::{ListenerConnection, Transport};
use async_trait::async_trait;
use event_telemetry::{
    metric_inc, time_histogram, DECODE_FAILURES, DISPATCH_DURATION, EVENTS_RECEIVED,
    HANDLER_ERRORS,
};
use event_types::{EventEnvelope, Topic};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, warn, Instrument};

/// Consumer callback for one topic.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &EventEnvelope) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into an [`EventHandler`].
pub struct HandlerFn<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for HandlerFn<F>
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: &EventEnvelope) -> anyhow::Result<()> {
        (self.0)(event.clone()).await
    }
}

/// Wrap an async closure as a shareable handler.
///
/// The closure receives its own copy of the envelope.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(HandlerFn(f))
}

/// Receives dispatch failures: the error, the event when it was decoded,
/// and the channel it arrived on.
pub type ErrorCallback = Arc<dyn Fn(&BusError, Option<&EventEnvelope>, &str) + Send + Sync>;

/// Construction options for a [`Subscriber`].
#[derive(Clone, Default)]
pub struct SubscriberOptions {
    pipeline: Pipeline,
    on_error: Option<ErrorCallback>,
}

impl SubscriberOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every handler invocation through `pipeline`.
    #[must_use]
    pub fn with_middleware(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Replace the default error callback, which logs at error level.
    #[must_use]
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&BusError, Option<&EventEnvelope>, &str) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(on_error) as ErrorCallback);
        self
    }
}

fn log_error(err: &BusError, event: Option<&EventEnvelope>, channel: &str) {
    match event {
        Some(event) => error!(
            topic = channel,
            event_id = %event.event_id(),
            error = %err,
            "Event handler failed"
        ),
        None => error!(topic = channel, error = %err, "Inbound message rejected"),
    }
}

fn same_handler(a: &Arc<dyn EventHandler>, b: &Arc<dyn EventHandler>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Innermost dispatch step: one handler.
struct InvokeHandler<'a> {
    handler: &'a dyn EventHandler,
}

#[async_trait]
impl<'a> Terminal for InvokeHandler<'a> {
    async fn call(&self, event: &EventEnvelope) -> BusResult<()> {
        self.handler.handle(event).await.map_err(BusError::Handler)
    }
}

struct SubscriberInner {
    transport: Arc<dyn Transport>,
    listener: Arc<dyn ListenerConnection>,
    handlers: RwLock<HashMap<Topic, Vec<Arc<dyn EventHandler>>>>,
    /// Serializes listen/unlisten commands against handler-map changes.
    command_lock: tokio::sync::Mutex<()>,
    pipeline: Pipeline,
    on_error: ErrorCallback,
}

impl SubscriberInner {
    async fn subscribe(&self, topic: Topic, handler: Arc<dyn EventHandler>) -> BusResult<()> {
        let _guard = self.command_lock.lock().await;

        let first = !self.handlers.read().contains_key(&topic);
        if first {
            self.listener.listen(&[topic.as_str()]).await?;
        }

        let mut handlers = self.handlers.write();
        let registered = handlers.entry(topic).or_default();
        if registered.iter().any(|h| same_handler(h, &handler)) {
            debug!(topic = %topic, "Handler already subscribed");
        } else {
            registered.push(handler);
            debug!(topic = %topic, handlers = registered.len(), "Handler subscribed");
        }
        Ok(())
    }

    async fn unsubscribe(&self, topic: Topic, handler: &Arc<dyn EventHandler>) -> BusResult<()> {
        let _guard = self.command_lock.lock().await;

        let last = {
            let mut handlers = self.handlers.write();
            let Some(registered) = handlers.get_mut(&topic) else {
                return Ok(());
            };
            registered.retain(|h| !same_handler(h, handler));
            let last = registered.is_empty();
            if last {
                handlers.remove(&topic);
            }
            last
        };

        if last {
            self.listener.unlisten(&[topic.as_str()]).await?;
        }
        debug!(topic = %topic, "Handler unsubscribed");
        Ok(())
    }

    async fn unsubscribe_all(&self) -> BusResult<()> {
        let _guard = self.command_lock.lock().await;

        let topics: Vec<Topic> = self.handlers.read().keys().copied().collect();
        if topics.is_empty() {
            return Ok(());
        }

        let channels: Vec<&str> = topics.iter().map(|t| t.as_str()).collect();
        self.listener.unlisten(&channels).await?;
        self.handlers.write().clear();
        debug!(topics = topics.len(), "Unsubscribed from all topics");
        Ok(())
    }

    async fn dispatch(&self, channel: &str, payload: &str) {
        let envelope = match decode(payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                metric_inc!(DECODE_FAILURES);
                warn!(topic = channel, error = %err, "Dropping undecodable message");
                (self.on_error)(&err, None, channel);
                return;
            }
        };
        metric_inc!(EVENTS_RECEIVED, &[envelope.topic().as_str()]);

        let Ok(topic) = channel.parse::<Topic>() else {
            debug!(channel = channel, "Message on unregistered channel");
            return;
        };
        let handlers = self.handlers.read().get(&topic).cloned().unwrap_or_default();
        if handlers.is_empty() {
            debug!(topic = %topic, event_id = %envelope.event_id(), "No handlers, message dropped");
            return;
        }

        let span = info_span!(
            "event_dispatch",
            event_id = %envelope.event_id(),
            topic = %topic,
            correlation_id = envelope.correlation_id().unwrap_or_default(),
        );

        async {
            let _timer = time_histogram!(DISPATCH_DURATION, &[topic.as_str()]);
            for handler in &handlers {
                let terminal = InvokeHandler {
                    handler: handler.as_ref(),
                };
                let result = if self.pipeline.is_empty() {
                    terminal.call(&envelope).await
                } else {
                    self.pipeline.execute(&envelope, &terminal).await
                };

                if let Err(err) = result {
                    metric_inc!(HANDLER_ERRORS, &[topic.as_str()]);
                    (self.on_error)(&err, Some(&envelope), channel);
                }
            }
            debug!(handlers = handlers.len(), "Event dispatched");
        }
        .instrument(span)
        .await;
    }
}

async fn listen(inner: Arc<SubscriberInner>) {
    while let Some(message) = inner.listener.next_message().await {
        let inner = inner.clone();
        tokio::spawn(async move {
            inner.dispatch(&message.channel, &message.payload).await;
        });
    }
    debug!("Listener connection closed, dispatch loop finished");
}

/// Topic → handler registry bound to a dedicated listening connection.
///
/// Dropping the subscriber stops its listener task; call
/// [`Subscriber::disconnect`] to also release the transport-side
/// subscriptions.
pub struct Subscriber {
    inner: Arc<SubscriberInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Subscriber {
    /// Open the listening connection and start dispatching.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        options: SubscriberOptions,
    ) -> BusResult<Self> {
        let listener = transport.duplicate().await?;
        let inner = Arc::new(SubscriberInner {
            transport,
            listener,
            handlers: RwLock::new(HashMap::new()),
            command_lock: tokio::sync::Mutex::new(()),
            pipeline: options.pipeline,
            on_error: options
                .on_error
                .unwrap_or_else(|| Arc::new(log_error) as ErrorCallback),
        });
        let task = tokio::spawn(listen(inner.clone()));

        debug!("Subscriber connected");
        Ok(Self {
            inner,
            task: Mutex::new(Some(task)),
        })
    }

    /// Register `handler` for `topic`.
    ///
    /// The first handler for a topic starts listening on its channel.
    /// Registering the same handler (same `Arc`) twice is a no-op.
    pub async fn subscribe(
        &self,
        topic: Topic,
        handler: Arc<dyn EventHandler>,
    ) -> BusResult<Subscription> {
        self.inner.subscribe(topic, handler.clone()).await?;
        Ok(Subscription {
            topic,
            handler,
            inner: Arc::downgrade(&self.inner),
        })
    }

    /// Register one handler for several topics.
    pub async fn subscribe_many(
        &self,
        topics: &[Topic],
        handler: Arc<dyn EventHandler>,
    ) -> BusResult<Vec<Subscription>> {
        let mut subscriptions = Vec::with_capacity(topics.len());
        for topic in topics {
            subscriptions.push(self.subscribe(*topic, handler.clone()).await?);
        }
        Ok(subscriptions)
    }

    /// Stop listening on every topic with one command and forget all
    /// handlers.
    pub async fn unsubscribe_all(&self) -> BusResult<()> {
        self.inner.unsubscribe_all().await
    }

    /// Decode `payload` and run every handler registered for `channel`.
    ///
    /// Driven by the listener task; exposed for transports that deliver
    /// messages by other means.
    pub async fn dispatch(&self, channel: &str, payload: &str) {
        self.inner.dispatch(channel, payload).await;
    }

    /// Topics with at least one handler, in registry order.
    #[must_use]
    pub fn subscribed_topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.inner.handlers.read().keys().copied().collect();
        topics.sort();
        topics
    }

    /// Whether any handler is registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.inner.handlers.read().is_empty()
    }

    /// Unsubscribe everything, close the listening connection and wait for
    /// the listener task to finish.
    pub async fn disconnect(&self) -> BusResult<()> {
        self.inner.unsubscribe_all().await?;
        self.inner.listener.close().await?;

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Listener task ended abnormally");
                }
            }
        }
        debug!("Subscriber disconnected");
        Ok(())
    }

    /// Whether the transport currently answers.
    pub async fn health_check(&self) -> bool {
        match self.inner.transport.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Subscriber health check failed");
                false
            }
        }
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

/// Handle for one (topic, handler) registration.
pub struct Subscription {
    topic: Topic,
    handler: Arc<dyn EventHandler>,
    inner: Weak<SubscriberInner>,
}

impl Subscription {
    #[must_use]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Remove this handler from its topic; the last handler stops listening
    /// on the channel. A no-op once the subscriber is gone.
    pub async fn unsubscribe(self) -> BusResult<()> {
        let Some(inner) = self.inner.upgrade() else {
            return Ok(());
        };
        inner.unsubscribe(self.topic, &self.handler).await
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish()
    }
}
