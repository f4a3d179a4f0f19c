//! # Middleware Pipeline
//!
//! Onion composition around a terminal action, shared by publishing and
//! consuming:
//!
//! ```text
//! compose([A, B]).execute(event, terminal)
//!
//!   A ──► B ──► terminal
//!   A ◄── B ◄──┘
//! ```
//!
//! Layer 0 runs first and wraps everything after it. A layer continues the
//! chain with [`Next::run`]; a layer that returns without calling it
//! short-circuits the rest, terminal included.
//!
//! ## Re-entrancy Guard
//!
//! Each execution keeps a cursor of how far the chain has been dispatched.
//! Continuing to a position that was already reached fails with
//! [`BusError::DoubleDispatch`]. When a downstream step fails the cursor is
//! rewound, so a layer may run the rest of the chain again after an error
//! (this is how [`RetryMiddleware`] works), never after a success.

mod dead_letter;
mod logging;
mod retry;
mod validation;

pub use dead_letter::{DeadLetterCallback, DeadLetterMiddleware};
pub use logging::LoggingMiddleware;
pub use retry::RetryMiddleware;
pub(crate) use retry::linear_backoff;
pub use validation::ValidationMiddleware;

use crate::error::{BusError, BusResult};
use async_trait::async_trait;
use event_types::EventEnvelope;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One layer of the pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process `event`, calling `next.run()` at most once per successful
    /// downstream pass.
    async fn handle(&self, event: &EventEnvelope, next: Next<'_>) -> BusResult<()>;
}

/// Innermost action of a pipeline (transmit, invoke a handler).
#[async_trait]
pub trait Terminal: Send + Sync {
    async fn call(&self, event: &EventEnvelope) -> BusResult<()>;
}

/// Continuation handed to a middleware: the rest of the chain.
pub struct Next<'a> {
    /// Index of the step this continuation dispatches to; equal to the
    /// number of layers for the terminal.
    position: usize,
    layers: &'a [Arc<dyn Middleware>],
    event: &'a EventEnvelope,
    terminal: &'a dyn Terminal,
    cursor: &'a AtomicUsize,
}

impl<'a> Next<'a> {
    /// Run the rest of the chain.
    ///
    /// # Errors
    ///
    /// `BusError::DoubleDispatch` if this step was already dispatched in
    /// this execution, otherwise whatever downstream returns.
    pub async fn run(&self) -> BusResult<()> {
        let reached = self.cursor.fetch_max(self.position + 1, Ordering::SeqCst);
        if reached > self.position {
            return Err(BusError::DoubleDispatch {
                position: self.position,
            });
        }

        let result = match self.layers.get(self.position) {
            Some(layer) => {
                let next = Next {
                    position: self.position + 1,
                    layers: self.layers,
                    event: self.event,
                    terminal: self.terminal,
                    cursor: self.cursor,
                };
                layer.handle(self.event, next).await
            }
            None => self.terminal.call(self.event).await,
        };

        if result.is_err() {
            self.cursor.store(self.position, Ordering::SeqCst);
        }
        result
    }

    /// Position of the step this continuation leads to.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }
}

#[async_trait]
impl<'a> Terminal for Next<'a> {
    async fn call(&self, _event: &EventEnvelope) -> BusResult<()> {
        self.run().await
    }
}

/// Ordered list of middleware layers.
#[derive(Clone, Default)]
pub struct Pipeline {
    layers: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer; it runs inside every layer added before it.
    #[must_use]
    pub fn with(mut self, layer: Arc<dyn Middleware>) -> Self {
        self.layers.push(layer);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Run `event` through every layer and then `terminal`.
    pub async fn execute(&self, event: &EventEnvelope, terminal: &dyn Terminal) -> BusResult<()> {
        let cursor = AtomicUsize::new(0);
        let next = Next {
            position: 0,
            layers: &self.layers,
            event,
            terminal,
            cursor: &cursor,
        };
        next.run().await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("layers", &self.layers.len())
            .finish()
    }
}

/// A pipeline is itself a layer, so pipelines nest.
#[async_trait]
impl Middleware for Pipeline {
    async fn handle(&self, event: &EventEnvelope, next: Next<'_>) -> BusResult<()> {
        self.execute(event, &next).await
    }
}

/// Build a pipeline from layers, outermost first.
#[must_use]
pub fn compose(layers: Vec<Arc<dyn Middleware>>) -> Pipeline {
    Pipeline { layers }
}
