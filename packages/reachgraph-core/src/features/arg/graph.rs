//! Node arena

use super::edge::{ArgEdge, NodeId};
use crate::shared::models::{BlockId, Cfa};
use crate::shared::ports::AbstractState;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// One ARG node
#[derive(Debug, Clone)]
pub struct ArgNode<S: AbstractState, P> {
    id: NodeId,
    state: S,
    parents: BTreeMap<NodeId, ArgEdge<S, P>>,
    children: BTreeSet<NodeId>,
    covered_by: Option<NodeId>,
    covering: BTreeSet<NodeId>,
}

impl<S: AbstractState, P> ArgNode<S, P> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn parents(&self) -> impl Iterator<Item = (NodeId, &ArgEdge<S, P>)> + '_ {
        self.parents.iter().map(|(id, edge)| (*id, edge))
    }

    pub fn parent_edge(&self, parent: NodeId) -> Option<&ArgEdge<S, P>> {
        self.parents.get(&parent)
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().copied()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn covered_by(&self) -> Option<NodeId> {
        self.covered_by
    }

    pub fn is_covered(&self) -> bool {
        self.covered_by.is_some()
    }

    /// Nodes covered by this one
    pub fn covering(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.covering.iter().copied()
    }

    /// Reached by lifting an exit of any block summary
    pub fn is_expanded(&self) -> bool {
        self.parents.values().any(ArgEdge::is_summary)
    }

    /// Reached by lifting an exit of a summary of `block`
    pub fn is_expanded_from(&self, block: BlockId) -> bool {
        self.parents.values().any(|edge| edge.is_summary_of(block))
    }

    /// Reached through a function-call edge of `cfa`
    pub fn entered_by_call(&self, cfa: &Cfa) -> bool {
        self.parents.values().any(|edge| {
            edge.cfa_edge()
                .and_then(|id| cfa.edge(id))
                .map_or(false, |edge| edge.is_call())
        })
    }
}

/// Arena of ARG nodes; removed slots stay empty so ids are never reused
#[derive(Debug, Clone)]
pub struct Arg<S: AbstractState, P> {
    nodes: Vec<Option<ArgNode<S, P>>>,
    live: usize,
}

impl<S: AbstractState, P> Default for Arg<S, P> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            live: 0,
        }
    }
}

impl<S: AbstractState, P: Clone> Arg<S, P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, state: S) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(ArgNode {
            id,
            state,
            parents: BTreeMap::new(),
            children: BTreeSet::new(),
            covered_by: None,
            covering: BTreeSet::new(),
        }));
        self.live += 1;
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&ArgNode<S, P>> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut ArgNode<S, P>> {
        self.nodes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Link `parent -> child`; both must be live
    pub fn link(&mut self, parent: NodeId, child: NodeId, edge: ArgEdge<S, P>) -> bool {
        if !self.contains(parent) || !self.contains(child) {
            return false;
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.insert(child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parents.insert(parent, edge);
        }
        true
    }

    pub fn set_covered(&mut self, node: NodeId, by: NodeId) -> bool {
        if node == by || !self.contains(node) || !self.contains(by) {
            return false;
        }
        self.uncover(node);
        if let Some(n) = self.node_mut(node) {
            n.covered_by = Some(by);
        }
        if let Some(n) = self.node_mut(by) {
            n.covering.insert(node);
        }
        true
    }

    pub fn uncover(&mut self, node: NodeId) {
        let by = self.node_mut(node).and_then(|n| n.covered_by.take());
        if let Some(by) = by {
            if let Some(n) = self.node_mut(by) {
                n.covering.remove(&node);
            }
        }
    }

    /// Detach and drop `id`
    pub fn remove_node(&mut self, id: NodeId) -> Option<ArgNode<S, P>> {
        let node = self.nodes.get_mut(id.0 as usize)?.take()?;
        self.live -= 1;
        for parent in node.parents.keys() {
            if let Some(p) = self.node_mut(*parent) {
                p.children.remove(&id);
            }
        }
        for child in &node.children {
            if let Some(c) = self.node_mut(*child) {
                c.parents.remove(&id);
            }
        }
        for covered in &node.covering {
            if let Some(c) = self.node_mut(*covered) {
                c.covered_by = None;
            }
        }
        if let Some(by) = node.covered_by {
            if let Some(b) = self.node_mut(by) {
                b.covering.remove(&id);
            }
        }
        Some(node)
    }

    /// Move every link of `old` onto `new`, then drop `old`
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> bool {
        if old == new || !self.contains(new) {
            return false;
        }
        let child_edges: Vec<(NodeId, ArgEdge<S, P>)> = match self.node(old) {
            Some(node) => node
                .children()
                .filter_map(|child| {
                    let edge = self.node(child)?.parents.get(&old)?.clone();
                    Some((child, edge))
                })
                .collect(),
            None => return false,
        };
        let Some(node) = self.remove_node(old) else {
            return false;
        };
        for (parent, edge) in node.parents {
            self.link(parent, new, edge);
        }
        for (child, edge) in child_edges {
            self.link(new, child, edge);
        }
        for covered in node.covering {
            self.set_covered(covered, new);
        }
        true
    }

    /// Every node reachable through child links, breadth first, without `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut seen = BTreeSet::from([id]);
        let mut order = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let Some(node) = self.node(current) else {
                continue;
            };
            for child in node.children() {
                if seen.insert(child) {
                    order.push(child);
                    queue.push_back(child);
                }
            }
        }
        order
    }

    /// Shortest parent chain from `root` down to `id`
    pub fn path_between(&self, root: NodeId, id: NodeId) -> Option<Vec<NodeId>> {
        self.node(root)?;
        self.node(id)?;
        let mut via: BTreeMap<NodeId, NodeId> = BTreeMap::new();
        let mut queue = VecDeque::from([id]);
        let mut seen = BTreeSet::from([id]);
        while let Some(current) = queue.pop_front() {
            if current == root {
                let mut path = vec![current];
                let mut cursor = current;
                while let Some(next) = via.get(&cursor) {
                    path.push(*next);
                    cursor = *next;
                }
                return Some(path);
            }
            for (parent, _) in self.node(current)?.parents() {
                if seen.insert(parent) {
                    via.insert(parent, current);
                    queue.push_back(parent);
                }
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArgNode<S, P>> + '_ {
        self.nodes.iter().filter_map(Option::as_ref)
    }
}
