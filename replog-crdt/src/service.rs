//! Generic CRDT service.
//!
//! A [`CrdtService`] is a cloneable handle to a single owner task. The owner
//! holds every identifier's state and the registry of client requests still
//! waiting for their operation to come back from the event log. It reacts to
//! three inputs:
//!
//! - client commands (`update`, `stop`) over an mpsc channel;
//! - events delivered by the log subscription, self-originated or replicated;
//! - append failures reported by the tasks that perform appends.
//!
//! Appends run on their own tasks so the owner never waits on the log, and
//! state only changes when an event is delivered. The log's delivery order
//! is therefore the only order in which state evolves.

use crate::error::{CrdtError, CrdtResult};
use crate::ops::CrdtServiceOps;
use replog_log::{EventLog, EventStream, LogError};
use replog_types::{AggregateId, DurableEvent, EmitterId, RequestId, VectorClock};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Default capacity of the command channel.
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

/// Configuration for a CRDT service.
#[derive(Debug, Clone)]
pub struct CrdtServiceConfig {
    /// Emitter id stamped on every event the service appends.
    pub emitter_id: EmitterId,
    /// Capacity of the command channel feeding the owner task.
    pub command_buffer: usize,
}

impl Default for CrdtServiceConfig {
    fn default() -> Self {
        Self {
            emitter_id: EmitterId::from("crdt-service"),
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

/// Local replica of one identifier.
struct Replica<S> {
    state: S,
    /// Merge of the vector timestamps of every event folded so far.
    applied: VectorClock,
}

type Replicas<S> = Arc<RwLock<HashMap<AggregateId, Replica<S>>>>;

enum Command<O: CrdtServiceOps> {
    Update {
        id: AggregateId,
        operation: O::Operation,
        reply: oneshot::Sender<CrdtResult<O::Value>>,
    },
    Stop,
}

/// A client request waiting for its event to be delivered.
struct PendingUpdate<V> {
    id: AggregateId,
    reply: oneshot::Sender<CrdtResult<V>>,
}

enum Fold {
    Applied,
    Duplicate,
    Rejected(CrdtError),
}

/// Handle to a running CRDT service.
pub struct CrdtService<O: CrdtServiceOps> {
    ops: Arc<O>,
    replicas: Replicas<O::State>,
    command_tx: mpsc::Sender<Command<O>>,
}

impl<O: CrdtServiceOps> Clone for CrdtService<O> {
    fn clone(&self) -> Self {
        Self {
            ops: Arc::clone(&self.ops),
            replicas: Arc::clone(&self.replicas),
            command_tx: self.command_tx.clone(),
        }
    }
}

impl<O: CrdtServiceOps> CrdtService<O> {
    /// Subscribes to `log` and starts the owner task.
    ///
    /// Events already stored in the log are folded first, so a service
    /// started on a non-empty log recovers the state they describe.
    pub async fn start(
        ops: O,
        log: Arc<dyn EventLog<O::Operation>>,
        config: CrdtServiceConfig,
    ) -> CrdtResult<Self> {
        let events = log.subscribe(None).await?;
        let ops = Arc::new(ops);
        let replicas: Replicas<O::State> = Arc::new(RwLock::new(HashMap::new()));
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (failure_tx, failure_rx) = mpsc::unbounded_channel();

        info!(
            "Starting CRDT service {} on log {}",
            config.emitter_id,
            log.log_id()
        );
        let owner = Owner {
            ops: Arc::clone(&ops),
            replicas: Arc::clone(&replicas),
            log,
            emitter_id: config.emitter_id,
            pending: HashMap::new(),
            failure_tx,
        };
        tokio::spawn(owner.run(command_rx, events, failure_rx));

        Ok(Self {
            ops,
            replicas,
            command_tx,
        })
    }

    /// Applies `operation` to identifier `id` through the event log.
    ///
    /// Resolves with the new value once the log has delivered the operation
    /// back to this service and it has been folded into local state.
    pub async fn update(&self, id: AggregateId, operation: O::Operation) -> CrdtResult<O::Value> {
        let (reply, response) = oneshot::channel();
        self.command_tx
            .send(Command::Update {
                id,
                operation,
                reply,
            })
            .await
            .map_err(|_| CrdtError::ServiceStopped)?;
        response.await.map_err(|_| CrdtError::ServiceStopped)?
    }

    /// Returns the current local value of `id`.
    ///
    /// Never blocks on the log and never fails: an identifier without state
    /// yields the zero value. The result may lag behind peers whose events
    /// have not replicated here yet.
    pub fn value(&self, id: &AggregateId) -> O::Value {
        read_value(&*self.ops, &self.replicas, id)
    }

    /// Returns the identifiers that have local state, in order.
    pub fn ids(&self) -> Vec<AggregateId> {
        let replicas = self.replicas.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<_> = replicas.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stops the owner task and waits for it to exit.
    ///
    /// Requests still in flight fail with [`CrdtError::ServiceStopped`];
    /// local values stay readable. Returns `false` if the service had
    /// already stopped.
    pub async fn stop(&self) -> bool {
        let was_running = self.command_tx.send(Command::Stop).await.is_ok();
        self.stopped().await;
        was_running
    }

    /// Waits until the owner task has exited, either through [`stop`](Self::stop)
    /// or because the log ended the subscription.
    pub async fn stopped(&self) {
        self.command_tx.closed().await;
    }

    /// Returns the CRDT behaviour this service was started with.
    pub fn ops(&self) -> &O {
        &self.ops
    }
}

/// The owner task's state.
struct Owner<O: CrdtServiceOps> {
    ops: Arc<O>,
    replicas: Replicas<O::State>,
    log: Arc<dyn EventLog<O::Operation>>,
    emitter_id: EmitterId,
    pending: HashMap<RequestId, PendingUpdate<O::Value>>,
    failure_tx: mpsc::UnboundedSender<(RequestId, LogError)>,
}

impl<O: CrdtServiceOps> Owner<O> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command<O>>,
        mut events: EventStream<O::Operation>,
        mut failures: mpsc::UnboundedReceiver<(RequestId, LogError)>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Update { id, operation, reply }) => {
                        self.handle_update(id, operation, reply);
                    }
                    Some(Command::Stop) | None => break,
                },
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        warn!("Event log {} stopped delivering", self.log.log_id());
                        break;
                    }
                },
                Some((request_id, error)) = failures.recv() => {
                    self.handle_append_failure(request_id, error);
                }
            }
        }

        for (_, pending) in self.pending.drain() {
            let _ = pending.reply.send(Err(CrdtError::ServiceStopped));
        }
        info!("CRDT service {} stopped", self.emitter_id);
    }

    fn handle_update(
        &mut self,
        id: AggregateId,
        operation: O::Operation,
        reply: oneshot::Sender<CrdtResult<O::Value>>,
    ) {
        let request_id = RequestId::new();
        let event = DurableEvent::new(operation, self.emitter_id.clone())
            .with_emitter_aggregate_id(id.clone())
            .with_delivery_id(request_id.to_string());
        debug!("Request {} appending operation for {}", request_id, id);
        self.pending.insert(request_id, PendingUpdate { id, reply });

        let log = Arc::clone(&self.log);
        let failures = self.failure_tx.clone();
        tokio::spawn(async move {
            if let Err(error) = log.append(event).await {
                let _ = failures.send((request_id, error));
            }
        });
    }

    fn handle_append_failure(&mut self, request_id: RequestId, error: LogError) {
        if let Some(pending) = self.pending.remove(&request_id) {
            warn!("Append for {} failed: {}", pending.id, error);
            let _ = pending.reply.send(Err(CrdtError::AppendFailed(error)));
        }
    }

    fn handle_event(&mut self, event: DurableEvent<O::Operation>) {
        if !event.is_prepared() {
            warn!("Ignoring delivered event without causal identity");
            return;
        }
        let pending = self.take_pending(&event);

        let mut outcome = None;
        for id in event.destination_aggregate_ids() {
            let fold = self.fold(&id, &event);
            if pending.as_ref().is_some_and(|p| p.id == id) {
                outcome = Some(fold);
            } else if let Fold::Rejected(error) = fold {
                warn!("Rejected operation for {}: {}", id, error);
            }
        }

        if let Some(pending) = pending {
            let result = match outcome {
                Some(Fold::Rejected(error)) => Err(error),
                Some(Fold::Applied | Fold::Duplicate) | None => {
                    Ok(read_value(&*self.ops, &self.replicas, &pending.id))
                }
            };
            let _ = pending.reply.send(result);
        }
    }

    /// Removes and returns the request waiting for `event`, if it is ours.
    fn take_pending(
        &mut self,
        event: &DurableEvent<O::Operation>,
    ) -> Option<PendingUpdate<O::Value>> {
        if event.emitter_id() != &self.emitter_id {
            return None;
        }
        let request_id: RequestId = event.delivery_id()?.parse().ok()?;
        self.pending.remove(&request_id)
    }

    fn fold(&self, id: &AggregateId, event: &DurableEvent<O::Operation>) -> Fold {
        let mut replicas = self.replicas.write().unwrap_or_else(PoisonError::into_inner);
        let replica = replicas.entry(id.clone()).or_insert_with(|| Replica {
            state: self.ops.zero(),
            applied: VectorClock::new(),
        });

        // Delivery follows causal order, so an event covered by what this
        // replica has already folded can only be a redelivery.
        if event.before(&replica.applied) {
            debug!(
                "Dropping duplicate delivery for {} at {:?}",
                id,
                event.vector_timestamp()
            );
            return Fold::Duplicate;
        }
        replica.applied.merge(event.vector_timestamp());

        match self.ops.update(
            &replica.state,
            event.payload(),
            event.vector_timestamp(),
            event.system_timestamp(),
        ) {
            Ok(state) => {
                replica.state = state;
                Fold::Applied
            }
            Err(error) => Fold::Rejected(error),
        }
    }
}

fn read_value<O: CrdtServiceOps>(
    ops: &O,
    replicas: &Replicas<O::State>,
    id: &AggregateId,
) -> O::Value {
    let replicas = replicas.read().unwrap_or_else(PoisonError::into_inner);
    match replicas.get(id) {
        Some(replica) => ops.value(&replica.state),
        None => ops.value(&ops.zero()),
    }
}
