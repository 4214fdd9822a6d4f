//! Durable events: the unit of storage, replication and delivery.
//!
//! A [`DurableEvent`] wraps an application payload with routing metadata,
//! a causal identity and per-replica physical provenance. The causal
//! identity (originating process and vector timestamp) is assigned once by
//! the first log that stores the event and survives replication unchanged;
//! the physical fields are re-stamped by every log that stores a copy.

use crate::filter::ReplicationFilter;
use crate::{AggregateId, EmitterId, LogId, Result, VectorClock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sequence number of an event that no log has stored yet.
pub const UNDEFINED_SEQUENCE_NR: u64 = 0;

/// The causal identity of an event: where it originated and what it had
/// causally seen at that point.
///
/// Two copies of the same logical event held by different replicas always
/// have equal causal identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CausalId {
    /// The log that originated the event.
    pub process_id: LogId,
    /// The event's vector timestamp.
    pub vector_timestamp: VectorClock,
}

/// An immutable, causally stamped event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurableEvent<P> {
    payload: P,
    emitter_id: EmitterId,
    /// Default routing key. `None` means the event has no default destination.
    #[serde(default)]
    emitter_aggregate_id: Option<AggregateId>,
    #[serde(default)]
    custom_destination_aggregate_ids: BTreeSet<AggregateId>,
    /// Wall-clock hint in milliseconds, informational only.
    #[serde(default)]
    system_timestamp: u64,
    #[serde(default)]
    vector_timestamp: VectorClock,
    /// `None` until the first log stores the event; never changes afterwards.
    #[serde(default)]
    process_id: Option<LogId>,
    /// `None` until a log stores the event.
    #[serde(default)]
    local_log_id: Option<LogId>,
    /// [`UNDEFINED_SEQUENCE_NR`] until a log stores the event.
    #[serde(default)]
    local_sequence_nr: u64,
    #[serde(default)]
    delivery_id: Option<String>,
    #[serde(default)]
    persist_on_event_sequence_nr: Option<u64>,
}

impl<P> DurableEvent<P> {
    /// Creates an event that no log has stored yet.
    #[must_use]
    pub fn new(payload: P, emitter_id: EmitterId) -> Self {
        Self {
            payload,
            emitter_id,
            emitter_aggregate_id: None,
            custom_destination_aggregate_ids: BTreeSet::new(),
            system_timestamp: 0,
            vector_timestamp: VectorClock::new(),
            process_id: None,
            local_log_id: None,
            local_sequence_nr: UNDEFINED_SEQUENCE_NR,
            delivery_id: None,
            persist_on_event_sequence_nr: None,
        }
    }

    /// Sets the default routing key.
    #[must_use]
    pub fn with_emitter_aggregate_id(mut self, aggregate_id: AggregateId) -> Self {
        self.emitter_aggregate_id = Some(aggregate_id);
        self
    }

    /// Adds routing keys beyond the default one.
    #[must_use]
    pub fn with_custom_destination_aggregate_ids(
        mut self,
        aggregate_ids: impl IntoIterator<Item = AggregateId>,
    ) -> Self {
        self.custom_destination_aggregate_ids.extend(aggregate_ids);
        self
    }

    /// Attaches an application-level delivery correlation id.
    #[must_use]
    pub fn with_delivery_id(mut self, delivery_id: impl Into<String>) -> Self {
        self.delivery_id = Some(delivery_id.into());
        self
    }

    /// Records the sequence number of the event whose handler emitted this one.
    #[must_use]
    pub fn with_persist_on_event_sequence_nr(mut self, sequence_nr: u64) -> Self {
        self.persist_on_event_sequence_nr = Some(sequence_nr);
        self
    }

    /// Folds a log's current version into the vector timestamp so that the
    /// event will be causally after everything that log already stores.
    ///
    /// No-op once the event has a causal identity.
    #[must_use]
    pub fn with_causal_past(mut self, version: &VectorClock) -> Self {
        if self.process_id.is_none() {
            self.vector_timestamp.merge(version);
        }
        self
    }

    /// Stamps the event for storage in `log_id` at `sequence_nr`.
    ///
    /// If no log has stored the event before, `log_id` becomes its causal
    /// originator and its own coordinate is set to `sequence_nr`. Otherwise
    /// the causal identity is kept as is. The physical fields are always
    /// overwritten, so every replica records its own storage coordinates.
    #[must_use]
    pub fn prepare(mut self, log_id: &LogId, sequence_nr: u64, system_timestamp: u64) -> Self {
        if self.process_id.is_none() {
            self.vector_timestamp = self.vector_timestamp.with_local_time(log_id, sequence_nr);
            self.process_id = Some(log_id.clone());
        }
        self.system_timestamp = system_timestamp;
        self.local_log_id = Some(log_id.clone());
        self.local_sequence_nr = sequence_nr;
        self
    }

    /// Returns true if this event is already known as of `vector_time`.
    #[must_use]
    pub fn before(&self, vector_time: &VectorClock) -> bool {
        self.vector_timestamp.le(vector_time)
    }

    /// Returns true if this event should be shipped to a replication target
    /// whose current version is `vector_time`: it must be causally novel to
    /// the target and accepted by `filter`.
    #[must_use]
    pub fn replicable<F>(&self, vector_time: &VectorClock, filter: &F) -> bool
    where
        F: ReplicationFilter<P> + ?Sized,
    {
        !self.before(vector_time) && filter.accepts(self)
    }

    /// The default routing key, i.e. the emitter's aggregate id.
    #[must_use]
    pub fn default_destination_aggregate_id(&self) -> Option<&AggregateId> {
        self.emitter_aggregate_id.as_ref()
    }

    /// All routing keys of this event.
    #[must_use]
    pub fn destination_aggregate_ids(&self) -> BTreeSet<AggregateId> {
        let mut ids = self.custom_destination_aggregate_ids.clone();
        if let Some(default_id) = self.default_destination_aggregate_id() {
            ids.insert(default_id.clone());
        }
        ids
    }

    /// Returns true if a consumer subscribed with `aggregate_id` receives
    /// this event. A consumer without an aggregate id receives everything.
    #[must_use]
    pub fn routes_to(&self, aggregate_id: Option<&AggregateId>) -> bool {
        match aggregate_id {
            None => true,
            Some(id) => {
                self.emitter_aggregate_id.as_ref() == Some(id)
                    || self.custom_destination_aggregate_ids.contains(id)
            }
        }
    }

    /// The causal identity, or `None` if no log has stored the event.
    #[must_use]
    pub fn causal_id(&self) -> Option<CausalId> {
        self.process_id.as_ref().map(|process_id| CausalId {
            process_id: process_id.clone(),
            vector_timestamp: self.vector_timestamp.clone(),
        })
    }

    /// Returns true once a log has assigned the causal identity.
    #[must_use]
    pub fn is_prepared(&self) -> bool {
        self.process_id.is_some()
    }

    #[must_use]
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Consumes the event, returning its payload.
    #[must_use]
    pub fn into_payload(self) -> P {
        self.payload
    }

    #[must_use]
    pub fn emitter_id(&self) -> &EmitterId {
        &self.emitter_id
    }

    #[must_use]
    pub fn emitter_aggregate_id(&self) -> Option<&AggregateId> {
        self.emitter_aggregate_id.as_ref()
    }

    #[must_use]
    pub fn custom_destination_aggregate_ids(&self) -> &BTreeSet<AggregateId> {
        &self.custom_destination_aggregate_ids
    }

    #[must_use]
    pub fn system_timestamp(&self) -> u64 {
        self.system_timestamp
    }

    #[must_use]
    pub fn vector_timestamp(&self) -> &VectorClock {
        &self.vector_timestamp
    }

    #[must_use]
    pub fn process_id(&self) -> Option<&LogId> {
        self.process_id.as_ref()
    }

    #[must_use]
    pub fn local_log_id(&self) -> Option<&LogId> {
        self.local_log_id.as_ref()
    }

    #[must_use]
    pub fn local_sequence_nr(&self) -> u64 {
        self.local_sequence_nr
    }

    #[must_use]
    pub fn delivery_id(&self) -> Option<&str> {
        self.delivery_id.as_deref()
    }

    #[must_use]
    pub fn persist_on_event_sequence_nr(&self) -> Option<u64> {
        self.persist_on_event_sequence_nr
    }
}

impl<P: Serialize> DurableEvent<P> {
    /// Serializes the full field set, causal and physical, as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<P: DeserializeOwned> DurableEvent<P> {
    /// Parses an event previously written with [`DurableEvent::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
