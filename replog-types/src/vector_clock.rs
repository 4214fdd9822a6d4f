//! Vector clock for causality tracking.
//!
//! A vector clock maps each log (process) to the highest local sequence
//! number of that log an event has causally seen. Comparing two clocks
//! yields the happens-before relationship between the events carrying them.
//!
//! Use cases:
//! - Causal identity of a [`DurableEvent`](crate::DurableEvent)
//! - Replication admission (is an event already known at a target?)
//! - Duplicate detection when folding events into CRDT state
//! - Tie-breaking concurrent writes in timestamp-aware CRDTs

use crate::LogId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Causality relationship between two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CausalOrder {
    /// First clock happened strictly before the second.
    Before,
    /// First clock happened strictly after the second.
    After,
    /// Neither clock happened before the other.
    Concurrent,
    /// Clocks are identical.
    Equal,
}

/// A vector timestamp.
///
/// Absent coordinates read as 0, so a clock holding an explicit zero for
/// some log is equal to (and hashes like) one without that entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock {
    clocks: BTreeMap<LogId, u64>,
}

impl VectorClock {
    /// Creates a new empty vector clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clocks: BTreeMap::new(),
        }
    }

    /// Returns the time recorded for a process (0 if not present).
    #[must_use]
    pub fn get(&self, process_id: &LogId) -> u64 {
        self.clocks.get(process_id).copied().unwrap_or(0)
    }

    /// Returns the non-zero coordinates in process id order.
    pub fn entries(&self) -> impl Iterator<Item = (&LogId, u64)> {
        self.clocks
            .iter()
            .filter(|(_, time)| **time > 0)
            .map(|(id, time)| (id, *time))
    }

    /// Returns the number of non-zero coordinates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    /// Returns true if every coordinate is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy with exactly one coordinate replaced by `time`.
    ///
    /// The coordinate is overwritten, not merged. A log uses this to stamp
    /// its own freshly assigned sequence number onto an event it originates;
    /// it must never be used to record another process's progress.
    #[must_use]
    pub fn with_local_time(&self, process_id: &LogId, time: u64) -> Self {
        let mut result = self.clone();
        if time == 0 {
            result.clocks.remove(process_id);
        } else {
            result.clocks.insert(process_id.clone(), time);
        }
        result
    }

    /// Merges another vector clock into this one.
    ///
    /// For each process, takes the maximum of the two times.
    /// This operation is commutative, associative, and idempotent.
    pub fn merge(&mut self, other: &Self) {
        for (process_id, time) in other.entries() {
            let entry = self.clocks.entry(process_id.clone()).or_insert(0);
            if time > *entry {
                *entry = time;
            }
        }
    }

    /// Creates a new clock that is the merge of this and another.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    /// Returns true if every coordinate of `self` is `<=` the corresponding
    /// coordinate of `other` ("happened before or at").
    #[must_use]
    pub fn le(&self, other: &Self) -> bool {
        self.entries().all(|(id, time)| time <= other.get(id))
    }

    /// Compares this clock with another to determine causal ordering.
    #[must_use]
    pub fn compare(&self, other: &Self) -> CausalOrder {
        match (self.le(other), other.le(self)) {
            (true, true) => CausalOrder::Equal,
            (true, false) => CausalOrder::Before,
            (false, true) => CausalOrder::After,
            (false, false) => CausalOrder::Concurrent,
        }
    }

    /// Returns true if this clock is causally before the other.
    #[must_use]
    pub fn is_before(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::Before
    }

    /// Returns true if this clock is causally after the other.
    #[must_use]
    pub fn is_after(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::After
    }

    /// Returns true if this clock is concurrent with the other.
    #[must_use]
    pub fn is_concurrent(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::Concurrent
    }

    /// Returns true if this clock dominates the other (is >= for all processes).
    #[must_use]
    pub fn dominates(&self, other: &Self) -> bool {
        other.le(self)
    }
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.entries().eq(other.entries())
    }
}

impl Eq for VectorClock {}

impl Hash for VectorClock {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (id, time) in self.entries() {
            id.hash(state);
            time.hash(state);
        }
    }
}

impl<I: Into<LogId>> FromIterator<(I, u64)> for VectorClock {
    fn from_iter<T: IntoIterator<Item = (I, u64)>>(iter: T) -> Self {
        let mut clock = Self::new();
        for (id, time) in iter {
            clock = clock.with_local_time(&id.into(), time);
        }
        clock
    }
}
