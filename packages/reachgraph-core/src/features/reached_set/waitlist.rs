//! Waitlist with pluggable pop order
//!
//! Removal is lazy: every push gets a ticket and `live` remembers the ticket
//! currently valid for each state. Stale queue entries are skipped on pop.

use crate::config::WaitlistOrder;
use crate::shared::ports::AbstractState;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

#[derive(Debug, Clone)]
struct PriorityEntry<S> {
    priority: i64,
    ticket: u64,
    state: S,
}

impl<S> PartialEq for PriorityEntry<S> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.ticket == other.ticket
    }
}

impl<S> Eq for PriorityEntry<S> {}

impl<S> Ord for PriorityEntry<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on priority, older ticket first among equals
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.ticket.cmp(&self.ticket))
    }
}

impl<S> PartialOrd for PriorityEntry<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// States waiting to be expanded
#[derive(Debug, Clone)]
pub struct Waitlist<S: AbstractState> {
    order: WaitlistOrder,
    queue: VecDeque<(u64, S)>,
    heap: BinaryHeap<PriorityEntry<S>>,
    live: FxHashMap<S, u64>,
    next_ticket: u64,
}

impl<S: AbstractState> Waitlist<S> {
    pub fn new(order: WaitlistOrder) -> Self {
        Self {
            order,
            queue: VecDeque::new(),
            heap: BinaryHeap::new(),
            live: FxHashMap::default(),
            next_ticket: 0,
        }
    }

    pub fn order(&self) -> WaitlistOrder {
        self.order
    }

    /// Push `state` unless it is already waiting
    ///
    /// Returns `false` when the state was already waitlisted.
    pub fn push(&mut self, state: S) -> bool {
        if self.live.contains_key(&state) {
            return false;
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.live.insert(state.clone(), ticket);
        match self.order {
            WaitlistOrder::Dfs | WaitlistOrder::Bfs => self.queue.push_back((ticket, state)),
            WaitlistOrder::Priority => self.heap.push(PriorityEntry {
                priority: state.priority(),
                ticket,
                state,
            }),
        }
        true
    }

    pub fn pop(&mut self) -> Option<S> {
        loop {
            let (ticket, state) = match self.order {
                WaitlistOrder::Dfs => self.queue.pop_back()?,
                WaitlistOrder::Bfs => self.queue.pop_front()?,
                WaitlistOrder::Priority => {
                    let entry = self.heap.pop()?;
                    (entry.ticket, entry.state)
                }
            };
            if self.live.get(&state) == Some(&ticket) {
                self.live.remove(&state);
                return Some(state);
            }
        }
    }

    /// Forget `state`; its queued entry becomes stale
    pub fn remove(&mut self, state: &S) -> bool {
        let removed = self.live.remove(state).is_some();
        if self.live.is_empty() {
            self.queue.clear();
            self.heap.clear();
        }
        removed
    }

    pub fn contains(&self, state: &S) -> bool {
        self.live.contains_key(state)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.heap.clear();
        self.live.clear();
    }
}
