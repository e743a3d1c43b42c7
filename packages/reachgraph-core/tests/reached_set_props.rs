//! Reached-set invariants under random operation sequences

use proptest::prelude::*;
use reachgraph_core::{
    AbstractState, EngineError, LocationId, PartitionStrategy, ReachedSet, WaitlistOrder,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct St(u32, u8);

impl AbstractState for St {
    fn location(&self) -> LocationId {
        LocationId(self.0)
    }

    fn priority(&self) -> i64 {
        self.1 as i64
    }
}

#[derive(Debug, Clone)]
enum Op {
    Add(St, u8),
    Remove(St),
    Pop,
    ReAdd(St),
}

fn state() -> impl Strategy<Value = St> {
    (0u32..4, 0u8..4).prop_map(|(l, v)| St(l, v))
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (state(), 0u8..2).prop_map(|(s, p)| Op::Add(s, p)),
        1 => state().prop_map(Op::Remove),
        2 => Just(Op::Pop),
        1 => state().prop_map(Op::ReAdd),
    ]
}

fn order() -> impl Strategy<Value = WaitlistOrder> {
    prop_oneof![
        Just(WaitlistOrder::Dfs),
        Just(WaitlistOrder::Bfs),
        Just(WaitlistOrder::Priority),
    ]
}

fn partitioning() -> impl Strategy<Value = PartitionStrategy> {
    prop_oneof![Just(PartitionStrategy::Location), Just(PartitionStrategy::Single)]
}

/// Draining a copy only yields contained states
fn waitlist_within_mapping(set: &ReachedSet<St, u8>) -> bool {
    let mut copy = set.clone();
    while copy.has_waiting_state() {
        match copy.pop_from_waitlist() {
            Ok(s) if set.contains(&s) => {}
            _ => return false,
        }
    }
    true
}

proptest! {
    #[test]
    fn operations_keep_invariants(
        order in order(),
        partitioning in partitioning(),
        ops in prop::collection::vec(op(), 1..60),
    ) {
        let mut set: ReachedSet<St, u8> = ReachedSet::new(order, partitioning);
        for op in ops {
            let before = set.len();
            match op {
                Op::Add(s, p) => {
                    let previous = set.precision(&s).copied();
                    match set.add(s.clone(), p) {
                        Ok(added) => {
                            prop_assert_eq!(added, previous.is_none());
                            prop_assert_eq!(set.len(), before + usize::from(added));
                        }
                        Err(EngineError::PrecisionConflict { .. }) => {
                            prop_assert!(previous.is_some() && previous != Some(p));
                            prop_assert_eq!(set.precision(&s).copied(), previous);
                            prop_assert_eq!(set.len(), before);
                        }
                        Err(other) => prop_assert!(false, "unexpected {:?}", other),
                    }
                    prop_assert!(set.contains(&s));
                }
                Op::Remove(s) => {
                    set.remove(&s);
                    prop_assert!(set.len() <= before);
                    prop_assert!(!set.contains(&s));
                    prop_assert!(!set.is_waiting(&s));
                }
                Op::Pop => {
                    let waiting = set.has_waiting_state();
                    match set.pop_from_waitlist() {
                        Ok(s) => {
                            prop_assert!(waiting);
                            prop_assert!(set.contains(&s));
                        }
                        Err(EngineError::EmptyWaitlist) => prop_assert!(!waiting),
                        Err(other) => prop_assert!(false, "unexpected {:?}", other),
                    }
                    prop_assert_eq!(set.len(), before);
                }
                Op::ReAdd(s) => {
                    let known = set.contains(&s);
                    prop_assert_eq!(set.re_add_to_waitlist(&s), known);
                    prop_assert_eq!(set.len(), before);
                }
            }
            prop_assert!(set.waitlist_len() <= set.len());
            prop_assert!(waitlist_within_mapping(&set));
            for candidate in set.states().filter(|c| c.0 == 0) {
                prop_assert!(set.candidates(&St(0, 9)).any(|c| c == candidate));
            }
        }
    }

    #[test]
    fn readding_an_equal_pair_is_a_no_op(s in state(), p in 0u8..3) {
        let mut set: ReachedSet<St, u8> = ReachedSet::new(WaitlistOrder::Bfs, PartitionStrategy::Location);
        prop_assert!(set.add(s.clone(), p).unwrap());
        set.pop_from_waitlist().unwrap();
        prop_assert!(!set.add(s.clone(), p).unwrap());
        prop_assert_eq!(set.len(), 1);
        prop_assert!(!set.has_waiting_state());
    }
}
