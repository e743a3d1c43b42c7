//! Node identifiers and ARG edge labels

use super::reached::ArgReachedSet;
use crate::features::block_cache::CacheKey;
use crate::shared::models::{BlockId, EdgeId};
use crate::shared::ports::AbstractState;
use std::fmt;
use std::sync::Arc;

/// Stable arena index of an ARG node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registration of one expanded block exit
///
/// Points at the cache entry (by key) and the reduced exit state the child
/// was expanded from. Analyses that bypass the cache keep their nested set
/// here so the path through them can still be rebuilt.
#[derive(Debug)]
pub struct ExpansionRecord<S: AbstractState, P> {
    pub key: CacheKey<S, P>,
    pub reduced_exit: S,
    pub private: Option<Arc<ArgReachedSet<S, P>>>,
}

impl<S: AbstractState, P> ExpansionRecord<S, P> {
    pub fn block(&self) -> BlockId {
        self.key.block
    }
}

/// Label of a parent -> child link
#[derive(Debug, Clone)]
pub enum ArgEdge<S: AbstractState, P> {
    /// Ordinary transfer along one CFA edge
    Cfa(EdgeId),
    /// Expansion of a block exit
    Summary(Arc<ExpansionRecord<S, P>>),
}

impl<S: AbstractState, P> ArgEdge<S, P> {
    pub fn cfa_edge(&self) -> Option<EdgeId> {
        match self {
            Self::Cfa(id) => Some(*id),
            Self::Summary(_) => None,
        }
    }

    pub fn summary(&self) -> Option<&Arc<ExpansionRecord<S, P>>> {
        match self {
            Self::Cfa(_) => None,
            Self::Summary(record) => Some(record),
        }
    }

    pub fn is_summary(&self) -> bool {
        matches!(self, Self::Summary(_))
    }

    pub fn is_summary_of(&self, block: BlockId) -> bool {
        matches!(self, Self::Summary(record) if record.block() == block)
    }
}
