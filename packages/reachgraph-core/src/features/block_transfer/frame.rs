//! Call-stack frames of nested block analyses

use crate::features::block_cache::{CacheKey, EntryId, ExitState};
use crate::shared::models::BlockId;
use crate::shared::ports::AbstractState;
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;

/// One nested analysis in progress
#[derive(Debug, Clone)]
pub struct CallFrame<S: AbstractState, P> {
    pub key: CacheKey<S, P>,
    pub block: BlockId,
    /// Cache entry holding the nested set; `None` when analyzed privately
    pub entry: Option<EntryId>,
    /// Exits assumed for recursive calls of this key
    pub approximation: Vec<ExitState<S, P>>,
    pub approximation_used: bool,
    /// Outer frames whose approximation this analysis consumed
    pub provisional_on: BTreeSet<EntryId>,
    /// Consumed the approximation of an outer frame that is not cached
    pub depends_on_private: bool,
}

impl<S: AbstractState, P> CallFrame<S, P> {
    pub fn new(key: CacheKey<S, P>, block: BlockId, entry: Option<EntryId>) -> Self {
        Self {
            key,
            block,
            entry,
            approximation: Vec::new(),
            approximation_used: false,
            provisional_on: BTreeSet::new(),
            depends_on_private: false,
        }
    }

    /// Results of this frame must not outlive the fixpoint of an outer frame
    pub fn is_provisional(&self) -> bool {
        self.approximation_used || !self.provisional_on.is_empty() || self.depends_on_private
    }

    /// Exits equal the approximation, compared as sets of states
    pub fn is_stable(&self, exits: &[ExitState<S, P>]) -> bool {
        let current: FxHashSet<&S> = exits.iter().map(|e| &e.state).collect();
        let assumed: FxHashSet<&S> = self.approximation.iter().map(|e| &e.state).collect();
        current == assumed
    }
}
