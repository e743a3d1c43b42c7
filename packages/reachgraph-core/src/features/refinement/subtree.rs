//! Subtree removal

use crate::errors::{EngineError, EngineResult};
use crate::features::arg::{ArgReachedSet, NodeId};
use crate::features::block_cache::{BlockSummaryCache, CacheKey, EntryId};
use crate::shared::ports::{AbstractPrecision, AbstractState};
use std::collections::BTreeSet;
use tracing::debug;

/// What a subtree removal changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovedSubtree {
    /// Removed nodes, children before parents
    pub removed: Vec<NodeId>,
    /// Surviving nodes put back on the waitlist
    pub readded: Vec<NodeId>,
}

impl RemovedSubtree {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Remove every descendant of `node` and re-waitlist `node`
///
/// Nodes on the path from the root to `node` survive even when a merge made
/// them reachable from `node`. Covered leaves whose covering node is removed
/// go too, and their parents are re-waitlisted along with every surviving
/// parent of a removed node. `precision` replaces the precision of `node`.
///
/// Fails with [`EngineError::UnknownNode`] before touching anything if `node`
/// is not a reached node of `reached`.
pub fn remove_subtree<S, P>(
    reached: &mut ArgReachedSet<S, P>,
    node: NodeId,
    precision: Option<P>,
) -> EngineResult<RemovedSubtree>
where
    S: AbstractState,
    P: AbstractPrecision,
{
    if !reached.is_reached(node) {
        return Err(EngineError::UnknownNode(node.0));
    }

    let ancestors: BTreeSet<NodeId> = reached
        .path_from_root(node)
        .unwrap_or_default()
        .into_iter()
        .collect();
    let mut doomed: Vec<NodeId> = reached
        .arg()
        .descendants(node)
        .into_iter()
        .filter(|id| !ancestors.contains(id))
        .collect();
    let mut doomed_set: BTreeSet<NodeId> = doomed.iter().copied().collect();

    // Leaves covered by a doomed node lose their justification
    let orphans: Vec<NodeId> = doomed
        .iter()
        .filter_map(|id| reached.node(*id))
        .flat_map(|n| n.covering().collect::<Vec<_>>())
        .filter(|id| !doomed_set.contains(id))
        .collect();
    for orphan in orphans {
        if doomed_set.insert(orphan) {
            doomed.push(orphan);
        }
    }

    let mut readd: BTreeSet<NodeId> = BTreeSet::new();
    for id in &doomed {
        if let Some(n) = reached.node(*id) {
            readd.extend(n.parents().map(|(parent, _)| parent).filter(|p| !doomed_set.contains(p)));
        }
    }
    readd.insert(node);

    for id in doomed.iter().rev() {
        reached.remove_node(*id);
    }
    if let Some(precision) = precision {
        reached.update_precision(node, precision);
    }

    let mut readded = Vec::with_capacity(readd.len());
    for id in readd {
        if reached.is_reached(id) {
            reached.re_add_to_waitlist(id);
            readded.push(id);
        }
    }

    doomed.reverse();
    debug!(node = %node, removed = doomed.len(), readded = readded.len(), "subtree removed");
    Ok(RemovedSubtree {
        removed: doomed,
        readded,
    })
}

/// Remove a subtree inside the nested set of a cached block
///
/// The entry stays as a partial hit with unknown exits; every entry that
/// expanded its exits is invalidated, transitively. Returns the removal and
/// the invalidated entries.
pub fn remove_subtree_in_block<S, P>(
    cache: &BlockSummaryCache<S, P>,
    key: &CacheKey<S, P>,
    node: NodeId,
    precision: Option<P>,
) -> EngineResult<(RemovedSubtree, Vec<EntryId>)>
where
    S: AbstractState,
    P: AbstractPrecision,
{
    cache.refine_nested_set(key, |set| remove_subtree(set, node, precision))
}

/// Drop the entry for `key` and every entry that depends on it
pub fn invalidate_block<S, P>(cache: &BlockSummaryCache<S, P>, key: &CacheKey<S, P>) -> Vec<EntryId>
where
    S: AbstractState,
    P: AbstractPrecision,
{
    let removed = cache.invalidate_key(key);
    debug!(block = %key.block, removed = removed.len(), "block invalidated");
    removed
}
