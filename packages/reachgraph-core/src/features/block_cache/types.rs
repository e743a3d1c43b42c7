//! Core types for the block-summary cache

use crate::features::arg::{ArgReachedSet, NodeId};
use crate::shared::models::BlockId;
use crate::shared::ports::AbstractState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Cache key: reduced entry state, reduced precision and block
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey<S, P> {
    pub state: S,
    pub precision: P,
    pub block: BlockId,
}

impl<S, P> CacheKey<S, P> {
    pub fn new(state: S, precision: P, block: BlockId) -> Self {
        Self {
            state,
            precision,
            block,
        }
    }
}

/// Cache entry identifier; never reused after invalidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Identity of an analysis worker sharing the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{}", self.0)
    }
}

/// Reduced exit state of a nested analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitState<S, P> {
    /// Node of the exit inside the entry's nested set
    pub node: NodeId,
    pub state: S,
    pub precision: P,
}

/// Classification of a key, ordered Miss < PartialHit < FullHit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CacheClass {
    Miss,
    PartialHit,
    FullHit,
}

/// Result of [`BlockSummaryCache::lookup`](super::BlockSummaryCache::lookup)
///
/// `Miss` and `PartialHit` hand the nested set to the caller, which owns it
/// until it checks it back in.
#[derive(Debug)]
pub enum CacheLookup<S: AbstractState, P> {
    FullHit {
        entry: EntryId,
        exits: Vec<ExitState<S, P>>,
        /// Recursion frames whose approximation these exits depend on
        provisional_on: BTreeSet<EntryId>,
    },
    PartialHit {
        entry: EntryId,
        reached: ArgReachedSet<S, P>,
    },
    Miss {
        entry: EntryId,
        reached: ArgReachedSet<S, P>,
    },
    /// Held by another worker or pending on another worker's recursion
    Busy,
}

impl<S: AbstractState, P> CacheLookup<S, P> {
    pub fn class(&self) -> Option<CacheClass> {
        match self {
            Self::FullHit { .. } => Some(CacheClass::FullHit),
            Self::PartialHit { .. } => Some(CacheClass::PartialHit),
            Self::Miss { .. } => Some(CacheClass::Miss),
            Self::Busy => None,
        }
    }

    pub fn entry(&self) -> Option<EntryId> {
        match self {
            Self::FullHit { entry, .. } | Self::PartialHit { entry, .. } | Self::Miss { entry, .. } => {
                Some(*entry)
            }
            Self::Busy => None,
        }
    }
}

/// Outcome reported when a nested set is checked back in
#[derive(Debug, Clone)]
pub enum CheckIn<S, P> {
    /// Analysis finished or stopped on a target; exits are final
    Complete {
        exits: Vec<ExitState<S, P>>,
        provisional_on: BTreeSet<EntryId>,
    },
    /// Analysis was interrupted; the set is kept for resumption
    Incomplete,
    /// Results depend on state that cannot be cached; drop the entry
    Discard,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub entries: usize,
    pub checked_out: usize,
    pub with_exits: usize,
    pub provisional: usize,
    pub dependencies: usize,
    pub full_hits: u64,
    pub partial_hits: u64,
    pub misses: u64,
    pub busy: u64,
    pub invalidations: u64,
}

impl CacheStatistics {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.full_hits as f64;
        let total = hits + self.partial_hits as f64 + self.misses as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}
