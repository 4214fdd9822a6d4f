//! The capability a CRDT variant supplies to a [`CrdtService`](crate::CrdtService).

use crate::error::CrdtResult;
use replog_types::VectorClock;

/// Behaviour of one operation-based CRDT variant.
///
/// A service folds every delivered operation through [`update`](Self::update)
/// in the log's delivery order. Replicas converge only if `update` commutes
/// for operations created concurrently, so variants whose operations do not
/// commute on their own must use the supplied timestamps to break ties.
pub trait CrdtServiceOps: Send + Sync + 'static {
    /// Per-identifier replica state.
    type State: Clone + Send + Sync + 'static;
    /// Externally observable projection of the state.
    type Value: Send + 'static;
    /// Operation carried as event payload.
    type Operation: Clone + Send + Sync + 'static;

    /// State of an identifier that has never been updated.
    fn zero(&self) -> Self::State;

    /// Projects a state to its value.
    fn value(&self, state: &Self::State) -> Self::Value;

    /// Applies an operation, returning the new state.
    ///
    /// Must be deterministic. `vector_timestamp` and `system_timestamp` are
    /// those of the event carrying the operation and are the only admissible
    /// ordering signal. The vector timestamp is the same at every replica;
    /// the system timestamp is the local storage time of this replica's copy,
    /// so a result that must converge cannot depend on it.
    ///
    /// Returns [`CrdtError::InvalidOperation`](crate::CrdtError::InvalidOperation)
    /// to reject the operation. A rejection must not depend on `state`,
    /// otherwise replicas folding in different orders reject different
    /// operations.
    fn update(
        &self,
        state: &Self::State,
        operation: &Self::Operation,
        vector_timestamp: &VectorClock,
        system_timestamp: u64,
    ) -> CrdtResult<Self::State>;
}
