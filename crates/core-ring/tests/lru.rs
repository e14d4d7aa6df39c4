//! Ring LRU property: pushing n+1 distinct values onto a ring of capacity
//! n evicts exactly the oldest; the rest stay fetchable in recency order.

use proptest::prelude::*;

use core_ring::{Ring, RingName};
use core_value::Datum;

proptest! {
    #[test]
    fn push_over_capacity_evicts_oldest(cap in 1usize..20) {
        let mut ring = Ring::with_size(RingName::Kill, cap);
        for v in 0..=(cap as i64) {
            ring.push(Datum::Int(v));
        }
        prop_assert_eq!(ring.size(), cap);
        // Values 1..=cap remain, most recent first.
        for i in 0..cap {
            let expect = cap as i64 - i as i64;
            prop_assert_eq!(ring.fetch(-(i as i64)).unwrap(), Datum::Int(expect));
        }
        // The oldest (0) is gone.
        prop_assert!(ring.fetch(-(cap as i64)).is_err());
    }

    #[test]
    fn cycling_preserves_membership(cap in 2usize..12, turns in -30i64..30) {
        let mut ring = Ring::with_size(RingName::Search, cap);
        for v in 0..cap as i64 {
            ring.push(Datum::Int(v));
        }
        ring.cycle(turns).unwrap();
        let mut seen: Vec<i64> = (0..cap)
            .map(|i| match ring.fetch(-(i as i64)).unwrap() {
                Datum::Int(v) => v,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        seen.sort_unstable();
        let expect: Vec<i64> = (0..cap as i64).collect();
        prop_assert_eq!(seen, expect);
    }
}
