//! Replication filters.
//!
//! A filter is an application-supplied predicate deciding whether an event
//! may be forwarded to a particular replication target. Filters run once per
//! (event, target) pair on every replication sweep, so implementations must
//! be cheap and free of side effects.

use crate::DurableEvent;

/// Decides whether an event may be replicated to a target.
pub trait ReplicationFilter<P>: Send + Sync {
    /// Returns true if `event` may be replicated.
    fn accepts(&self, event: &DurableEvent<P>) -> bool;
}

impl<P, F> ReplicationFilter<P> for F
where
    F: Fn(&DurableEvent<P>) -> bool + Send + Sync,
{
    fn accepts(&self, event: &DurableEvent<P>) -> bool {
        self(event)
    }
}

/// A filter that accepts every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<P> ReplicationFilter<P> for AcceptAll {
    fn accepts(&self, _event: &DurableEvent<P>) -> bool {
        true
    }
}

/// Accepts an event only if both filters accept it.
#[derive(Debug, Clone, Copy)]
pub struct And<A, B>(A, B);

impl<P, A, B> ReplicationFilter<P> for And<A, B>
where
    A: ReplicationFilter<P>,
    B: ReplicationFilter<P>,
{
    fn accepts(&self, event: &DurableEvent<P>) -> bool {
        self.0.accepts(event) && self.1.accepts(event)
    }
}

/// Accepts an event if either filter accepts it.
#[derive(Debug, Clone, Copy)]
pub struct Or<A, B>(A, B);

impl<P, A, B> ReplicationFilter<P> for Or<A, B>
where
    A: ReplicationFilter<P>,
    B: ReplicationFilter<P>,
{
    fn accepts(&self, event: &DurableEvent<P>) -> bool {
        self.0.accepts(event) || self.1.accepts(event)
    }
}

/// Composition helpers available on every filter.
pub trait ReplicationFilterExt<P>: ReplicationFilter<P> + Sized {
    /// Combines two filters with logical AND.
    fn and<B: ReplicationFilter<P>>(self, other: B) -> And<Self, B> {
        And(self, other)
    }

    /// Combines two filters with logical OR.
    fn or<B: ReplicationFilter<P>>(self, other: B) -> Or<Self, B> {
        Or(self, other)
    }
}

impl<P, F: ReplicationFilter<P>> ReplicationFilterExt<P> for F {}
