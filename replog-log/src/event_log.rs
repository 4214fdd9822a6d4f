//! Event log contract.
//!
//! Defines what a CRDT service (or any other consumer) needs from an event
//! log, allowing it to work with any backend.

use crate::error::LogResult;
use async_trait::async_trait;
use replog_types::{AggregateId, DurableEvent, LogId};
use tokio::sync::mpsc;

/// An append-only, causally ordered event log.
///
/// Implementations must:
/// - assign causal identity through [`DurableEvent::prepare`] with a
///   strictly increasing local sequence number;
/// - deliver every stored event to each subscriber it routes to, in a
///   stable local order consistent with causal order;
/// - deliver a writer's own events back to it.
///
/// Delivery is at-least-once; consumers deduplicate by causal identity.
#[async_trait]
pub trait EventLog<P: Send + 'static>: Send + Sync {
    /// Returns the log's identifier, which is also its causal process id.
    fn log_id(&self) -> &LogId;

    /// Appends a locally emitted event and returns the stored copy.
    async fn append(&self, event: DurableEvent<P>) -> LogResult<DurableEvent<P>>;

    /// Subscribes to events routed to `aggregate_id` (or to every event when
    /// `None`). Events already stored are delivered first, then live ones.
    async fn subscribe(&self, aggregate_id: Option<AggregateId>) -> LogResult<EventStream<P>>;
}

/// Receiving side of a log subscription.
///
/// The stream ends when the log is closed or dropped.
#[derive(Debug)]
pub struct EventStream<P> {
    rx: mpsc::UnboundedReceiver<DurableEvent<P>>,
}

impl<P> EventStream<P> {
    /// Creates a stream over a delivery channel.
    pub fn new(rx: mpsc::UnboundedReceiver<DurableEvent<P>>) -> Self {
        Self { rx }
    }

    /// Receives the next delivered event.
    /// Returns `None` once the log stops delivering.
    pub async fn recv(&mut self) -> Option<DurableEvent<P>> {
        self.rx.recv().await
    }

    /// Returns the next event if one is ready, without waiting.
    pub fn try_recv(&mut self) -> Option<DurableEvent<P>> {
        self.rx.try_recv().ok()
    }
}
