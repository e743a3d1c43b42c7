//! Reached set whose states are ARG nodes

use super::edge::{ArgEdge, NodeId};
use super::graph::{Arg, ArgNode};
use crate::config::{EngineConfig, PartitionStrategy, WaitlistOrder};
use crate::errors::{EngineError, EngineResult};
use crate::features::reached_set::ReachedSet;
use crate::shared::ports::{AbstractPrecision, AbstractState};
use rustc_hash::FxHashMap;

/// Reached set plus the ARG over its states
///
/// Every reached state has exactly one node. Covered leaves have nodes but
/// are not reached states.
#[derive(Debug, Clone)]
pub struct ArgReachedSet<S: AbstractState, P> {
    reached: ReachedSet<S, P>,
    arg: Arg<S, P>,
    node_of: FxHashMap<S, NodeId>,
    root: Option<NodeId>,
}

impl<S, P> ArgReachedSet<S, P>
where
    S: AbstractState,
    P: AbstractPrecision,
{
    pub fn new(order: WaitlistOrder, partitioning: PartitionStrategy) -> Self {
        Self {
            reached: ReachedSet::new(order, partitioning),
            arg: Arg::new(),
            node_of: FxHashMap::default(),
            root: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.waitlist_order, config.partitioning)
    }

    /// Fresh set seeded with `state` as its waitlisted root
    pub fn with_root(
        order: WaitlistOrder,
        partitioning: PartitionStrategy,
        state: S,
        precision: P,
    ) -> Self {
        let mut set = Self::new(order, partitioning);
        let id = set.arg.add_node(state.clone());
        set.node_of.insert(state.clone(), id);
        set.root = Some(id);
        // An empty reached set cannot conflict
        let _ = set.reached.add(state, precision);
        set
    }

    /// Empty copy with the same waitlist order and partitioning
    pub fn empty_like(&self) -> Self {
        Self::new(self.reached.waitlist_order(), self.reached.partitioning())
    }

    pub fn add_root(&mut self, state: S, precision: P) -> EngineResult<NodeId> {
        self.reached.add(state.clone(), precision)?;
        let id = self.arg.add_node(state.clone());
        self.node_of.insert(state, id);
        self.root.get_or_insert(id);
        Ok(id)
    }

    /// Add a new reached state as child of `parent`
    ///
    /// A state that is already reached becomes a covered leaf of its twin.
    pub fn add_successor(
        &mut self,
        parent: NodeId,
        state: S,
        precision: P,
        edge: ArgEdge<S, P>,
    ) -> EngineResult<NodeId> {
        self.require(parent)?;
        if let Some(twin) = self.node_of.get(&state).copied() {
            if self.reached.precision(&state) != Some(&precision) {
                return Err(EngineError::PrecisionConflict {
                    state: format!("{:?}", state),
                });
            }
            return self.add_covered_leaf(parent, state, edge, twin);
        }
        self.reached.add(state.clone(), precision)?;
        let id = self.arg.add_node(state.clone());
        self.node_of.insert(state, id);
        self.arg.link(parent, id, edge);
        Ok(id)
    }

    /// Add a child of `parent` that is covered by the reached node `by`
    pub fn add_covered_leaf(
        &mut self,
        parent: NodeId,
        state: S,
        edge: ArgEdge<S, P>,
        by: NodeId,
    ) -> EngineResult<NodeId> {
        self.require(parent)?;
        self.require(by)?;
        let id = self.arg.add_node(state);
        self.arg.link(parent, id, edge);
        self.arg.set_covered(id, by);
        Ok(id)
    }

    /// Replace the reached node `replaced` by the merge result `merged`
    ///
    /// The new node inherits every link of the replaced one and gets
    /// `parent -[edge]->` as an extra incoming link. If `merged` is already
    /// reached elsewhere the set is left unchanged and `replaced` is returned;
    /// stop covers the successor by that node afterwards.
    pub fn replace_with_merged(
        &mut self,
        replaced: NodeId,
        merged: S,
        precision: P,
        parent: NodeId,
        edge: ArgEdge<S, P>,
    ) -> EngineResult<NodeId> {
        self.require(parent)?;
        let old_state = self.require(replaced)?.state().clone();
        if self.node_of.get(&old_state) != Some(&replaced) {
            return Err(EngineError::UnknownNode(replaced.0));
        }
        if self.node_of.contains_key(&merged) {
            return Ok(replaced);
        }

        self.reached.remove(&old_state);
        self.node_of.remove(&old_state);
        self.reached.add(merged.clone(), precision)?;
        let id = self.arg.add_node(merged.clone());
        self.node_of.insert(merged, id);
        self.arg.replace_node(replaced, id);
        if parent != replaced {
            self.arg.link(parent, id, edge);
        }
        if self.root == Some(replaced) {
            self.root = Some(id);
        }
        Ok(id)
    }

    /// Drop one node from the graph and, if it is reached, from the mapping
    pub(crate) fn remove_node(&mut self, id: NodeId) -> Option<ArgNode<S, P>> {
        let node = self.arg.remove_node(id)?;
        if self.node_of.get(node.state()) == Some(&id) {
            self.node_of.remove(node.state());
            self.reached.remove(node.state());
        }
        if self.root == Some(id) {
            self.root = None;
        }
        Some(node)
    }

    pub fn pop_from_waitlist(&mut self) -> EngineResult<NodeId> {
        let state = self.reached.pop_from_waitlist()?;
        self.node_of
            .get(&state)
            .copied()
            .ok_or(EngineError::EmptyWaitlist)
    }

    pub fn re_add_to_waitlist(&mut self, id: NodeId) -> bool {
        match self.reached_state(id) {
            Some(state) => {
                let state = state.clone();
                self.reached.re_add_to_waitlist(&state)
            }
            None => false,
        }
    }

    pub fn update_precision(&mut self, id: NodeId, precision: P) -> bool {
        match self.reached_state(id) {
            Some(state) => {
                let state = state.clone();
                self.reached.update_precision(&state, precision)
            }
            None => false,
        }
    }

    /// Reached nodes that may merge with or cover `state`
    pub fn candidates<'a>(&'a self, state: &S) -> impl Iterator<Item = (NodeId, &'a S)> + 'a {
        self.reached
            .candidates(state)
            .filter_map(move |s| self.node_of.get(s).map(|id| (*id, s)))
    }

    fn require(&self, id: NodeId) -> EngineResult<&ArgNode<S, P>> {
        self.arg.node(id).ok_or(EngineError::UnknownNode(id.0))
    }

    fn reached_state(&self, id: NodeId) -> Option<&S> {
        let state = self.arg.node(id)?.state();
        (self.node_of.get(state) == Some(&id)).then_some(state)
    }

    pub fn node(&self, id: NodeId) -> Option<&ArgNode<S, P>> {
        self.arg.node(id)
    }

    pub fn state(&self, id: NodeId) -> Option<&S> {
        self.arg.node(id).map(ArgNode::state)
    }

    pub fn precision(&self, id: NodeId) -> Option<&P> {
        self.reached_state(id)
            .and_then(|state| self.reached.precision(state))
    }

    pub fn node_for(&self, state: &S) -> Option<NodeId> {
        self.node_of.get(state).copied()
    }

    /// Whether `id` is a live node of the reached mapping (not a covered leaf)
    pub fn is_reached(&self, id: NodeId) -> bool {
        self.reached_state(id).is_some()
    }

    pub fn is_waiting(&self, id: NodeId) -> bool {
        self.reached_state(id)
            .map_or(false, |state| self.reached.is_waiting(state))
    }

    /// Shortest ARG path from the root down to `id`
    pub fn path_from_root(&self, id: NodeId) -> Option<Vec<NodeId>> {
        self.arg.path_between(self.root?, id)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn root_state(&self) -> Option<&S> {
        self.root.and_then(|id| self.state(id))
    }

    pub fn reached(&self) -> &ReachedSet<S, P> {
        &self.reached
    }

    pub fn arg(&self) -> &Arg<S, P> {
        &self.arg
    }

    /// Reached nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.reached
            .states()
            .filter_map(move |state| self.node_of.get(state).copied())
    }

    pub fn target_nodes(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|id| self.state(*id).map_or(false, |state| state.is_target()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.reached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reached.is_empty()
    }

    pub fn has_waiting_state(&self) -> bool {
        self.reached.has_waiting_state()
    }

    pub fn waitlist_len(&self) -> usize {
        self.reached.waitlist_len()
    }
}
