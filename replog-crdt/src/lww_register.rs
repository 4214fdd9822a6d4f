//! Last-Writer-Wins register.
//!
//! Unlike a counter, assignments do not commute, so the register keeps every
//! causally unrelated version it has seen (its concurrent frontier) and
//! projects the winner among them. An assignment replaces the versions it
//! causally follows; concurrent versions are kept side by side.
//!
//! The winner is chosen from the vector timestamp alone, since it is the only
//! ordering data every replica sees unchanged (system timestamps are
//! re-stamped by each storing log). The version with the greatest causal
//! depth wins, i.e. the largest sum of vector-timestamp entries, which grows
//! along every causal chain. Equal depths are broken by comparing the sorted
//! entries lexicographically; distinct events never share a vector
//! timestamp, so the order is total. Both the frontier and the winner depend
//! only on the set of delivered events, so replicas agree.

use crate::error::CrdtResult;
use crate::ops::CrdtServiceOps;
use crate::service::CrdtService;
use replog_types::{AggregateId, VectorClock};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

/// Operation on a register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LwwOperation<T> {
    /// Writes a value.
    Assign(T),
    /// Writes "no value".
    Clear,
}

/// A register value together with the vector timestamp of the write that
/// made it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The written value; `None` for a clear.
    pub value: Option<T>,
    pub vector_timestamp: VectorClock,
}

impl<T> Versioned<T> {
    /// Number of events in this write's causal past, itself included.
    fn causal_depth(&self) -> u128 {
        self.vector_timestamp
            .entries()
            .map(|(_, time)| u128::from(time))
            .sum()
    }

    fn cmp_last_writer(&self, other: &Self) -> Ordering {
        self.causal_depth()
            .cmp(&other.causal_depth())
            .then_with(|| {
                self.vector_timestamp
                    .entries()
                    .cmp(other.vector_timestamp.entries())
            })
    }
}

/// Register behaviour for values of type `T`.
pub struct LwwRegisterOps<T> {
    _value: PhantomData<fn() -> T>,
}

impl<T> LwwRegisterOps<T> {
    /// Creates the register behaviour.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _value: PhantomData,
        }
    }

    /// Returns the version currently winning in `state`.
    pub fn winner<'a>(&self, state: &'a [Versioned<T>]) -> Option<&'a Versioned<T>> {
        state.iter().max_by(|a, b| a.cmp_last_writer(b))
    }
}

impl<T> Default for LwwRegisterOps<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LwwRegisterOps<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LwwRegisterOps")
    }
}

impl<T> CrdtServiceOps for LwwRegisterOps<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The concurrent frontier of versions.
    type State = Vec<Versioned<T>>;
    type Value = Option<T>;
    type Operation = LwwOperation<T>;

    fn zero(&self) -> Self::State {
        Vec::new()
    }

    fn value(&self, state: &Self::State) -> Option<T> {
        self.winner(state).and_then(|version| version.value.clone())
    }

    fn update(
        &self,
        state: &Self::State,
        operation: &LwwOperation<T>,
        vector_timestamp: &VectorClock,
        _: u64,
    ) -> CrdtResult<Self::State> {
        // A write already covered by a stored version changes nothing.
        if state
            .iter()
            .any(|version| vector_timestamp.le(&version.vector_timestamp))
        {
            return Ok(state.clone());
        }

        let mut frontier: Vec<_> = state
            .iter()
            .filter(|version| !version.vector_timestamp.is_before(vector_timestamp))
            .cloned()
            .collect();
        frontier.push(Versioned {
            value: match operation {
                LwwOperation::Assign(value) => Some(value.clone()),
                LwwOperation::Clear => None,
            },
            vector_timestamp: vector_timestamp.clone(),
        });
        Ok(frontier)
    }
}

/// A CRDT service managing LWW registers.
pub type LwwRegisterService<T> = CrdtService<LwwRegisterOps<T>>;

impl<T: Clone + Send + Sync + 'static> CrdtService<LwwRegisterOps<T>> {
    /// Writes `value` to register `id`.
    pub async fn assign(&self, id: AggregateId, value: T) -> CrdtResult<Option<T>> {
        self.update(id, LwwOperation::Assign(value)).await
    }

    /// Clears register `id`.
    pub async fn clear(&self, id: AggregateId) -> CrdtResult<Option<T>> {
        self.update(id, LwwOperation::Clear).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vt(entries: &[(&str, u64)]) -> VectorClock {
        entries.iter().map(|(id, t)| (*id, *t)).collect()
    }

    fn assign(
        ops: &LwwRegisterOps<&'static str>,
        state: &[Versioned<&'static str>],
        value: &'static str,
        clock: &[(&str, u64)],
        ts: u64,
    ) -> Vec<Versioned<&'static str>> {
        ops.update(&state.to_vec(), &LwwOperation::Assign(value), &vt(clock), ts)
            .unwrap()
    }

    #[test]
    fn empty_register_has_no_value() {
        let ops = LwwRegisterOps::<&str>::new();
        assert_eq!(ops.value(&ops.zero()), None);
    }

    #[test]
    fn causally_later_write_wins_even_with_older_wall_clock() {
        let ops = LwwRegisterOps::new();
        let state = assign(&ops, &[], "first", &[("A", 1)], 100);
        let state = assign(&ops, &state, "second", &[("A", 2)], 50);
        assert_eq!(ops.value(&state), Some("second"));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn concurrent_writes_are_kept_and_deeper_write_wins() {
        let ops = LwwRegisterOps::new();
        let state = assign(&ops, &[], "a", &[("A", 3)], 900);
        let state = assign(&ops, &state, "b", &[("B", 1)], 100);
        assert_eq!(state.len(), 2);
        assert_eq!(ops.value(&state), Some("a"));
    }

    #[test]
    fn equal_depths_break_ties_on_vector_entries() {
        let ops = LwwRegisterOps::new();
        let ab = assign(&ops, &[], "a", &[("A", 1)], 100);
        let ab = assign(&ops, &ab, "b", &[("B", 1)], 100);
        let ba = assign(&ops, &[], "b", &[("B", 1)], 100);
        let ba = assign(&ops, &ba, "a", &[("A", 1)], 100);
        assert_eq!(ops.value(&ab), Some("b"));
        assert_eq!(ops.value(&ba), Some("b"));
    }

    #[test]
    fn winner_ignores_local_storage_time() {
        // Each replica stores a copy under its own wall clock.
        let ops = LwwRegisterOps::new();
        let here = assign(&ops, &[], "a", &[("A", 1)], 1_000);
        let here = assign(&ops, &here, "b", &[("B", 1)], 5);
        let there = assign(&ops, &[], "a", &[("A", 1)], 7);
        let there = assign(&ops, &there, "b", &[("B", 1)], 2_000);
        assert_eq!(here, there);
        assert_eq!(ops.value(&here), ops.value(&there));
    }

    #[test]
    fn later_write_collapses_frontier() {
        let ops = LwwRegisterOps::new();
        let state = assign(&ops, &[], "a", &[("A", 1)], 100);
        let state = assign(&ops, &state, "b", &[("B", 1)], 200);
        let state = assign(&ops, &state, "c", &[("A", 1), ("B", 1), ("C", 1)], 10);
        assert_eq!(state.len(), 1);
        assert_eq!(ops.value(&state), Some("c"));
    }

    #[test]
    fn clear_removes_value() {
        let ops = LwwRegisterOps::new();
        let state = assign(&ops, &[], "a", &[("A", 1)], 100);
        let state = ops
            .update(&state, &LwwOperation::Clear, &vt(&[("A", 2)]), 101)
            .unwrap();
        assert_eq!(ops.value(&state), None);
    }

    #[test]
    fn redelivered_write_is_ignored() {
        let ops = LwwRegisterOps::new();
        let state = assign(&ops, &[], "a", &[("A", 1)], 100);
        let again = assign(&ops, &state, "a", &[("A", 1)], 100);
        assert_eq!(again, state);
    }
}
