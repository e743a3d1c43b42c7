//! Splicing nested paths into the outer ARG path

use super::path::{CounterexamplePath, PathStep};
use crate::errors::{EngineError, EngineResult};
use crate::features::arg::{ArgEdge, ArgReachedSet, ExpansionRecord, NodeId};
use crate::features::block_cache::{BlockSummaryCache, CacheError, CacheKey};
use crate::shared::ports::{AbstractPrecision, AbstractState};
use rustc_hash::FxHashSet;
use tracing::debug;

/// ARG path as cloned (state, incoming edge) pairs
type RawPath<S, P> = Vec<(S, Option<ArgEdge<S, P>>)>;

/// Rebuilds flat counterexamples from block-modular reached sets
pub struct CounterexampleReconstructor<'a, S: AbstractState, P> {
    cache: &'a BlockSummaryCache<S, P>,
    max_depth: usize,
}

impl<'a, S, P> CounterexampleReconstructor<'a, S, P>
where
    S: AbstractState,
    P: AbstractPrecision,
{
    pub fn new(cache: &'a BlockSummaryCache<S, P>, max_depth: usize) -> Self {
        Self { cache, max_depth }
    }

    /// Path from the root of `reached` to `target`
    ///
    /// Fails with [`EngineError::MissingBlockSummary`] when a nested set the
    /// path runs through was invalidated, is being re-analyzed or no longer
    /// holds the exit the outer state was expanded from.
    pub fn reconstruct(
        &self,
        reached: &ArgReachedSet<S, P>,
        target: NodeId,
    ) -> EngineResult<CounterexamplePath<S>> {
        let raw = raw_path(reached, target).ok_or(EngineError::UnknownNode(target.0))?;
        let mut visiting = FxHashSet::default();
        let steps = self.splice(raw, 0, &mut visiting)?;
        debug!(target = %target, steps = steps.len(), "counterexample reconstructed");
        Ok(CounterexamplePath::new(steps))
    }

    fn splice(
        &self,
        raw: RawPath<S, P>,
        depth: usize,
        visiting: &mut FxHashSet<(CacheKey<S, P>, S)>,
    ) -> EngineResult<Vec<PathStep<S>>> {
        let mut steps: Vec<PathStep<S>> = Vec::with_capacity(raw.len());
        for (state, edge) in raw {
            match edge {
                None => steps.push(PathStep {
                    location: state.location(),
                    state,
                    incoming: None,
                }),
                Some(ArgEdge::Cfa(id)) => steps.push(PathStep {
                    location: state.location(),
                    state,
                    incoming: Some(id),
                }),
                Some(ArgEdge::Summary(record)) => {
                    let inner = self.nested_path(&record, depth + 1, visiting)?;
                    // The nested root stands for the outer state at the block entry
                    let mut inner: Vec<PathStep<S>> = inner.into_iter().skip(1).collect();
                    let slot = match inner.last_mut() {
                        Some(last) => Some(last),
                        None => steps.last_mut(),
                    };
                    if let Some(slot) = slot {
                        slot.location = state.location();
                        slot.state = state;
                    }
                    steps.append(&mut inner);
                }
            }
        }
        Ok(steps)
    }

    fn nested_path(
        &self,
        record: &ExpansionRecord<S, P>,
        depth: usize,
        visiting: &mut FxHashSet<(CacheKey<S, P>, S)>,
    ) -> EngineResult<Vec<PathStep<S>>> {
        let block = record.block().to_string();
        if depth > self.max_depth {
            return Err(EngineError::missing_summary(block, "nesting deeper than the recursion bound"));
        }
        let marker = (record.key.clone(), record.reduced_exit.clone());
        if !visiting.insert(marker.clone()) {
            return Err(EngineError::missing_summary(block, "summary depends on itself"));
        }

        let raw = match &record.private {
            Some(set) => exit_path(set, &record.reduced_exit)
                .ok_or_else(|| EngineError::missing_summary(&*block, "exit not in nested set")),
            None => self.cached_exit_path(record, &block),
        };
        let result = raw.and_then(|raw| self.splice(raw, depth, visiting));
        visiting.remove(&marker);
        result
    }

    /// Clone the nested path out of the cache, so the lock is released
    /// before recursing
    fn cached_exit_path(
        &self,
        record: &ExpansionRecord<S, P>,
        block: &str,
    ) -> EngineResult<RawPath<S, P>> {
        let found = self.cache.with_nested_set(&record.key, |set, exits| {
            if exits.is_none() {
                return Err("exits are not final");
            }
            exit_path(set, &record.reduced_exit).ok_or("exit not in nested set")
        });
        match found {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(reason)) => Err(EngineError::missing_summary(block, reason)),
            Err(CacheError::NotFound) | Err(CacheError::UnknownEntry(_)) => {
                Err(EngineError::missing_summary(block, "no cache entry"))
            }
            Err(CacheError::EntryInUse { .. }) => {
                Err(EngineError::missing_summary(block, "entry is being re-analyzed"))
            }
            Err(other) => Err(EngineError::Cache(other)),
        }
    }
}

fn exit_path<S: AbstractState, P: AbstractPrecision>(
    set: &ArgReachedSet<S, P>,
    exit: &S,
) -> Option<RawPath<S, P>> {
    raw_path(set, set.node_for(exit)?)
}

fn raw_path<S: AbstractState, P: AbstractPrecision>(
    set: &ArgReachedSet<S, P>,
    target: NodeId,
) -> Option<RawPath<S, P>> {
    let ids = set.path_from_root(target)?;
    let mut raw = Vec::with_capacity(ids.len());
    let mut previous: Option<NodeId> = None;
    for id in ids {
        let node = set.node(id)?;
        let edge = match previous {
            Some(parent) => Some(node.parent_edge(parent)?.clone()),
            None => None,
        };
        raw.push((node.state().clone(), edge));
        previous = Some(id);
    }
    Some(raw)
}
