//! Shared fixtures for unit tests.

use crate::error::{BusError, BusResult, TransportError, TransportResult};
use crate::middleware::Terminal;
use crate::serializer::build_envelope;
use crate::transport::{ListenerConnection, OutboundMessage, Transport};
use async_trait::async_trait;
use chrono::Utc;
use event_types::payloads::OrderCancelled;
use event_types::{EnvelopeOptions, EventEnvelope, Topic, DEFAULT_VERSION};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub fn order_cancelled() -> OrderCancelled {
    OrderCancelled {
        order_id: "ord_1".to_string(),
        customer_id: "cus_1".to_string(),
        reason: Some("changed mind".to_string()),
    }
}

pub fn sample_event() -> EventEnvelope {
    build_envelope(order_cancelled().into(), "orders", &EnvelopeOptions::new()).unwrap()
}

pub fn event_with(event_id: Uuid, source: &str, data: Value) -> EventEnvelope {
    EventEnvelope::from_parts(
        event_id,
        Topic::OrderCancelled,
        DEFAULT_VERSION.to_string(),
        Utc::now(),
        source.to_string(),
        None,
        None,
        None,
        data,
    )
}

/// Terminal that fails its first `fail_first` calls.
pub struct CountingTerminal {
    calls: AtomicUsize,
    fail_first: usize,
}

impl CountingTerminal {
    pub fn succeeding() -> Self {
        Self::failing(0)
    }

    pub fn failing(fail_first: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Terminal for CountingTerminal {
    async fn call(&self, _event: &EventEnvelope) -> BusResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.fail_first {
            return Err(BusError::handler(anyhow::anyhow!("terminal failure {call}")));
        }
        Ok(())
    }
}

/// Transport that records what it is asked to send and fails the first
/// `fail_first` broadcasts.
#[derive(Default)]
pub struct ScriptedTransport {
    fail_first: AtomicUsize,
    pub broadcasts: Mutex<Vec<(String, String)>>,
    pub batches: Mutex<Vec<Vec<OutboundMessage>>>,
    down: AtomicBool,
}

impl ScriptedTransport {
    pub fn failing(fail_first: usize) -> Self {
        Self {
            fail_first: AtomicUsize::new(fail_first),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.broadcasts.lock().len()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn broadcast(&self, channel: &str, payload: String) -> TransportResult<usize> {
        self.broadcasts.lock().push((channel.to_string(), payload));
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Unavailable(format!(
                "scripted failure, {} left",
                remaining - 1
            )));
        }
        Ok(1)
    }

    async fn broadcast_atomic(&self, messages: Vec<OutboundMessage>) -> TransportResult<()> {
        self.batches.lock().push(messages);
        Ok(())
    }

    async fn ping(&self) -> TransportResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("down".to_string()));
        }
        Ok(())
    }

    async fn duplicate(&self) -> TransportResult<Arc<dyn ListenerConnection>> {
        Err(TransportError::Unavailable("listening not scripted".to_string()))
    }
}
