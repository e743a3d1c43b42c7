//! Ordered state/precision mapping with waitlist and partition index

use super::partition::PartitionKey;
use super::waitlist::Waitlist;
use crate::config::{EngineConfig, PartitionStrategy, WaitlistOrder};
use crate::errors::{EngineError, EngineResult};
use crate::shared::ports::{AbstractPrecision, AbstractState};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct Slot<P> {
    seq: u64,
    precision: P,
}

/// Reached set of one (outer or nested) analysis
///
/// Invariant: every waitlisted state is in the mapping.
#[derive(Debug, Clone)]
pub struct ReachedSet<S: AbstractState, P> {
    partitioning: PartitionStrategy,
    states: FxHashMap<S, Slot<P>>,
    by_seq: BTreeMap<u64, S>,
    partitions: FxHashMap<PartitionKey, BTreeSet<u64>>,
    waitlist: Waitlist<S>,
    next_seq: u64,
}

impl<S, P> ReachedSet<S, P>
where
    S: AbstractState,
    P: AbstractPrecision,
{
    pub fn new(order: WaitlistOrder, partitioning: PartitionStrategy) -> Self {
        Self {
            partitioning,
            states: FxHashMap::default(),
            by_seq: BTreeMap::new(),
            partitions: FxHashMap::default(),
            waitlist: Waitlist::new(order),
            next_seq: 0,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.waitlist_order, config.partitioning)
    }

    pub fn waitlist_order(&self) -> WaitlistOrder {
        self.waitlist.order()
    }

    pub fn partitioning(&self) -> PartitionStrategy {
        self.partitioning
    }

    /// Insert `state` with `precision` and waitlist it
    ///
    /// Returns `Ok(false)` if the state is already present with an equal
    /// precision. A different precision is a caller bug and leaves the set
    /// untouched.
    pub fn add(&mut self, state: S, precision: P) -> EngineResult<bool> {
        if let Some(slot) = self.states.get(&state) {
            if slot.precision == precision {
                return Ok(false);
            }
            return Err(EngineError::PrecisionConflict {
                state: format!("{:?}", state),
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.partitions
            .entry(PartitionKey::of(self.partitioning, &state))
            .or_default()
            .insert(seq);
        self.by_seq.insert(seq, state.clone());
        self.waitlist.push(state.clone());
        self.states.insert(state, Slot { seq, precision });
        Ok(true)
    }

    /// Delete `state` from the mapping, the waitlist and the partition index
    pub fn remove(&mut self, state: &S) -> Option<P> {
        let slot = self.states.remove(state)?;
        self.by_seq.remove(&slot.seq);
        self.waitlist.remove(state);
        let key = PartitionKey::of(self.partitioning, state);
        if let Some(partition) = self.partitions.get_mut(&key) {
            partition.remove(&slot.seq);
            if partition.is_empty() {
                self.partitions.remove(&key);
            }
        }
        Some(slot.precision)
    }

    pub fn pop_from_waitlist(&mut self) -> EngineResult<S> {
        self.waitlist.pop().ok_or(EngineError::EmptyWaitlist)
    }

    /// Re-enable processing of a reached state without duplicating it
    ///
    /// Returns `false` if the state is not in the mapping.
    pub fn re_add_to_waitlist(&mut self, state: &S) -> bool {
        if !self.states.contains_key(state) {
            return false;
        }
        self.waitlist.push(state.clone());
        true
    }

    /// Every state that may merge with or cover `state`, in insertion order
    pub fn candidates(&self, state: &S) -> impl Iterator<Item = &S> + '_ {
        let key = PartitionKey::of(self.partitioning, state);
        self.partitions
            .get(&key)
            .into_iter()
            .flat_map(|seqs| seqs.iter())
            .filter_map(move |seq| self.by_seq.get(seq))
    }

    pub fn contains(&self, state: &S) -> bool {
        self.states.contains_key(state)
    }

    pub fn precision(&self, state: &S) -> Option<&P> {
        self.states.get(state).map(|slot| &slot.precision)
    }

    /// Replace the precision of a reached state (refinement)
    pub fn update_precision(&mut self, state: &S, precision: P) -> bool {
        match self.states.get_mut(state) {
            Some(slot) => {
                slot.precision = precision;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn has_waiting_state(&self) -> bool {
        !self.waitlist.is_empty()
    }

    pub fn waitlist_len(&self) -> usize {
        self.waitlist.len()
    }

    pub fn is_waiting(&self, state: &S) -> bool {
        self.waitlist.contains(state)
    }

    pub fn first_state(&self) -> Option<&S> {
        self.by_seq.values().next()
    }

    pub fn last_state(&self) -> Option<&S> {
        self.by_seq.values().next_back()
    }

    /// States with precisions in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&S, &P)> + '_ {
        self.by_seq.values().filter_map(move |state| {
            self.states
                .get(state)
                .map(|slot| (state, &slot.precision))
        })
    }

    pub fn states(&self) -> impl Iterator<Item = &S> + '_ {
        self.by_seq.values()
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.by_seq.clear();
        self.partitions.clear();
        self.waitlist.clear();
    }
}
