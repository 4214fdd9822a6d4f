//! Property-based tests for the causal model.
//!
//! Verifies the algebra the rest of the system relies on:
//! - merge is commutative, associative and idempotent
//! - every clock is `le` its merge with any other clock
//! - compare is antisymmetric
//! - prepare never rewrites an existing causal identity

use proptest::prelude::*;
use replog_types::{AcceptAll, CausalOrder, DurableEvent, EmitterId, LogId, VectorClock};

fn clock_strategy() -> impl Strategy<Value = VectorClock> {
    prop::collection::vec((0usize..4, 0u64..20), 0..6).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(process, time)| (format!("L{process}"), time))
            .collect()
    })
}

proptest! {
    #[test]
    fn merge_is_commutative(a in clock_strategy(), b in clock_strategy()) {
        prop_assert_eq!(a.merged(&b), b.merged(&a));
    }

    #[test]
    fn merge_is_associative(a in clock_strategy(), b in clock_strategy(), c in clock_strategy()) {
        prop_assert_eq!(a.merged(&b).merged(&c), a.merged(&b.merged(&c)));
    }

    #[test]
    fn merge_is_idempotent(a in clock_strategy()) {
        prop_assert_eq!(a.merged(&a), a);
    }

    #[test]
    fn clock_is_le_its_merge(a in clock_strategy(), b in clock_strategy()) {
        prop_assert!(a.le(&a.merged(&b)));
        prop_assert!(b.le(&a.merged(&b)));
    }

    #[test]
    fn compare_is_antisymmetric(a in clock_strategy(), b in clock_strategy()) {
        let expected = match a.compare(&b) {
            CausalOrder::Before => CausalOrder::After,
            CausalOrder::After => CausalOrder::Before,
            other => other,
        };
        prop_assert_eq!(b.compare(&a), expected);
    }

    #[test]
    fn prepare_is_idempotent_on_causal_identity(
        past in clock_strategy(),
        first_seq in 1u64..1000,
        second_seq in 1u64..1000,
    ) {
        let original = DurableEvent::new((), EmitterId::from("e"))
            .with_causal_past(&past)
            .prepare(&LogId::from("origin"), first_seq, 0);
        let replicated = original.clone().prepare(&LogId::from("replica"), second_seq, 1);

        prop_assert_eq!(replicated.causal_id(), original.causal_id());
        prop_assert_eq!(replicated.local_sequence_nr(), second_seq);
    }

    #[test]
    fn known_events_are_never_replicable(past in clock_strategy(), seq in 1u64..1000, extra in clock_strategy()) {
        let e = DurableEvent::new((), EmitterId::from("e"))
            .with_causal_past(&past)
            .prepare(&LogId::from("origin"), seq, 0);
        let target = e.vector_timestamp().merged(&extra);
        prop_assert!(!e.replicable(&target, &AcceptAll));
    }
}
