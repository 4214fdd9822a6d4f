//! Replicated counter.
//!
//! The operation is a delta and the state is the running sum. Addition is
//! commutative and associative, so concurrent increments and decrements
//! converge regardless of delivery order and the timestamps are ignored.
//!
//! Sums wrap at the bounds of the number type. Wrapping addition is still
//! commutative and associative (modulo 2^n), so replicas agree even when an
//! intermediate sum leaves the representable range.

use crate::error::CrdtResult;
use crate::ops::CrdtServiceOps;
use crate::service::CrdtService;
use replog_types::{AggregateId, VectorClock};
use std::fmt;
use std::marker::PhantomData;

/// Integer type a counter can sum over.
pub trait Additive: Copy + fmt::Debug + Send + Sync + 'static {
    /// The additive identity.
    fn zero() -> Self;

    /// Adds two values, wrapping around at the type's bounds.
    fn wrapping_add(self, other: Self) -> Self;
}

macro_rules! additive {
    ($($t:ty),*) => {
        $(
            impl Additive for $t {
                fn zero() -> Self {
                    0
                }

                fn wrapping_add(self, other: Self) -> Self {
                    <$t>::wrapping_add(self, other)
                }
            }
        )*
    };
}

additive!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

/// Counter behaviour over any [`Additive`] number type.
pub struct CounterOps<N> {
    _number: PhantomData<fn() -> N>,
}

impl<N> CounterOps<N> {
    /// Creates the counter behaviour.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _number: PhantomData,
        }
    }
}

impl<N> Default for CounterOps<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> fmt::Debug for CounterOps<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CounterOps")
    }
}

impl<N: Additive> CrdtServiceOps for CounterOps<N> {
    type State = N;
    type Value = N;
    type Operation = N;

    fn zero(&self) -> N {
        N::zero()
    }

    fn value(&self, state: &N) -> N {
        *state
    }

    fn update(&self, state: &N, delta: &N, _: &VectorClock, _: u64) -> CrdtResult<N> {
        Ok(state.wrapping_add(*delta))
    }
}

/// A CRDT service managing counters.
pub type CounterService<N> = CrdtService<CounterOps<N>>;

impl<N: Additive> CrdtService<CounterOps<N>> {
    /// Adds `delta` (which may be negative) to counter `id`.
    pub async fn increment(&self, id: AggregateId, delta: N) -> CrdtResult<N> {
        self.update(id, delta).await
    }
}
