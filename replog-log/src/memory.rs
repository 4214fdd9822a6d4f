//! In-memory event log.
//!
//! Holds every event in a `Vec` guarded by a single mutex, which makes the
//! append path the log's one serialization point. Nothing is persisted.

use crate::error::{LogError, LogResult};
use crate::event_log::{EventLog, EventStream};
use async_trait::async_trait;
use replog_types::{system_time_millis, AggregateId, DurableEvent, LogId, VectorClock};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Configuration for an in-memory event log.
#[derive(Debug, Clone, Default)]
pub struct EventLogConfig {
    /// Maximum number of events the log will store. `None` means unbounded.
    pub capacity: Option<usize>,
}

struct Subscriber<P> {
    aggregate_id: Option<AggregateId>,
    tx: mpsc::UnboundedSender<DurableEvent<P>>,
}

struct LogState<P> {
    events: Vec<DurableEvent<P>>,
    /// Last assigned local sequence number.
    sequence_nr: u64,
    /// Merge of every stored event's vector timestamp.
    version: VectorClock,
    subscribers: Vec<Subscriber<P>>,
    closed: bool,
}

impl<P: Clone> LogState<P> {
    fn store(&mut self, log_id: &LogId, event: DurableEvent<P>) -> DurableEvent<P> {
        self.sequence_nr += 1;
        let stored = event.prepare(log_id, self.sequence_nr, system_time_millis());
        self.version.merge(stored.vector_timestamp());
        self.events.push(stored.clone());
        self.deliver(&stored);
        stored
    }

    fn deliver(&mut self, event: &DurableEvent<P>) {
        self.subscribers.retain(|subscriber| {
            if !event.routes_to(subscriber.aggregate_id.as_ref()) {
                return true;
            }
            let delivered = subscriber.tx.send(event.clone()).is_ok();
            if !delivered {
                warn!(
                    "Dropping subscriber {:?}: receiver gone",
                    subscriber.aggregate_id
                );
            }
            delivered
        });
    }
}

/// An event log held entirely in memory.
pub struct InMemoryEventLog<P> {
    log_id: LogId,
    config: EventLogConfig,
    state: Mutex<LogState<P>>,
}

impl<P: Clone + Send + Sync + 'static> InMemoryEventLog<P> {
    /// Creates an unbounded log.
    pub fn new(log_id: LogId) -> Self {
        Self::with_config(log_id, EventLogConfig::default())
    }

    /// Creates a log with a custom configuration.
    pub fn with_config(log_id: LogId, config: EventLogConfig) -> Self {
        Self {
            log_id,
            config,
            state: Mutex::new(LogState {
                events: Vec::new(),
                sequence_nr: 0,
                version: VectorClock::new(),
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EventLogConfig {
        &self.config
    }

    /// Returns the merged vector timestamp of all stored events.
    pub async fn version(&self) -> VectorClock {
        self.state.lock().await.version.clone()
    }

    /// Returns the last assigned local sequence number (0 when empty).
    pub async fn sequence_nr(&self) -> u64 {
        self.state.lock().await.sequence_nr
    }

    /// Returns the number of stored events.
    pub async fn len(&self) -> usize {
        self.state.lock().await.events.len()
    }

    /// Returns true if the log stores no events.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Reads up to `max` stored events starting at `from_sequence_nr`.
    pub async fn read(&self, from_sequence_nr: u64, max: usize) -> Vec<DurableEvent<P>> {
        let state = self.state.lock().await;
        // Sequence numbers are dense and start at 1.
        let start = usize::try_from(from_sequence_nr.saturating_sub(1)).unwrap_or(usize::MAX);
        state.events.iter().skip(start).take(max).cloned().collect()
    }

    /// Stores events replicated from another log.
    ///
    /// Events already covered by this log's version are skipped. Stored
    /// copies keep their causal identity and get this log's physical
    /// coordinates. Returns the copies actually stored.
    pub async fn write_replicated(
        &self,
        events: Vec<DurableEvent<P>>,
    ) -> LogResult<Vec<DurableEvent<P>>> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(LogError::Closed(self.log_id.clone()));
        }
        if let Some(unprepared) = events.iter().find(|e| !e.is_prepared()) {
            return Err(LogError::InvalidEvent(format!(
                "replicated event from emitter {} has no causal identity",
                unprepared.emitter_id()
            )));
        }

        // Decide novelty up front so a capacity failure writes nothing.
        let mut scratch = state.version.clone();
        let mut novel = Vec::with_capacity(events.len());
        for event in events {
            if event.before(&scratch) {
                debug!(
                    "Log {} skipping known event {:?}",
                    self.log_id,
                    event.vector_timestamp()
                );
                continue;
            }
            scratch.merge(event.vector_timestamp());
            novel.push(event);
        }
        self.check_capacity(&state, novel.len())?;

        let stored: Vec<_> = novel
            .into_iter()
            .map(|event| state.store(&self.log_id, event))
            .collect();
        debug!("Log {} stored {} replicated events", self.log_id, stored.len());
        Ok(stored)
    }

    /// Closes the log. Further writes and subscriptions fail and all
    /// existing subscription streams end.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.subscribers.clear();
        info!("Log {} closed", self.log_id);
    }

    fn check_capacity(&self, state: &LogState<P>, additional: usize) -> LogResult<()> {
        match self.config.capacity {
            Some(capacity) if state.events.len() + additional > capacity => {
                Err(LogError::CapacityExceeded {
                    log_id: self.log_id.clone(),
                    capacity,
                })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<P: Clone + Send + Sync + 'static> EventLog<P> for InMemoryEventLog<P> {
    fn log_id(&self) -> &LogId {
        &self.log_id
    }

    async fn append(&self, event: DurableEvent<P>) -> LogResult<DurableEvent<P>> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(LogError::Closed(self.log_id.clone()));
        }
        self.check_capacity(&state, 1)?;

        let event = event.with_causal_past(&state.version);
        let stored = state.store(&self.log_id, event);
        debug!(
            "Log {} appended event #{} from {}",
            self.log_id,
            stored.local_sequence_nr(),
            stored.emitter_id()
        );
        Ok(stored)
    }

    async fn subscribe(&self, aggregate_id: Option<AggregateId>) -> LogResult<EventStream<P>> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(LogError::Closed(self.log_id.clone()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut replayed = 0usize;
        for event in state
            .events
            .iter()
            .filter(|e| e.routes_to(aggregate_id.as_ref()))
        {
            // Receiver is alive: we still hold it.
            let _ = tx.send(event.clone());
            replayed += 1;
        }
        info!(
            "Log {} new subscriber {:?} ({} stored events replayed)",
            self.log_id, aggregate_id, replayed
        );
        state.subscribers.push(Subscriber { aggregate_id, tx });
        Ok(EventStream::new(rx))
    }
}
