//! Dependency graph between cache entries
//!
//! An edge `user -> used` records that the analysis of `user` expanded the
//! exits of `used`. Invalidating `used` must also invalidate every entry that
//! reaches it through incoming edges.

use super::types::EntryId;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use rustc_hash::FxHashMap;
use std::collections::{BTreeSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: StableDiGraph<EntryId, ()>,
    index: FxHashMap<EntryId, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, entry: EntryId) -> NodeIndex {
        if let Some(idx) = self.index.get(&entry) {
            return *idx;
        }
        let idx = self.graph.add_node(entry);
        self.index.insert(entry, idx);
        idx
    }

    /// Record that `user` consumed the exits of `used`
    pub fn add_dependency(&mut self, used: EntryId, user: EntryId) {
        if used == user {
            return;
        }
        let used_idx = self.node(used);
        let user_idx = self.node(user);
        if self.graph.find_edge(user_idx, used_idx).is_none() {
            self.graph.add_edge(user_idx, used_idx, ());
        }
    }

    /// `changed` and every entry that transitively depends on it (BFS)
    pub fn affected(&self, changed: EntryId) -> Vec<EntryId> {
        let mut affected = BTreeSet::from([changed]);
        let mut order = vec![changed];
        let mut queue = VecDeque::new();
        if let Some(idx) = self.index.get(&changed) {
            queue.push_back(*idx);
        }

        while let Some(idx) = queue.pop_front() {
            for neighbor in self.graph.neighbors_directed(idx, Direction::Incoming) {
                if let Some(entry) = self.graph.node_weight(neighbor) {
                    if affected.insert(*entry) {
                        order.push(*entry);
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        order
    }

    /// Direct users of `entry`
    pub fn users(&self, entry: EntryId) -> Vec<EntryId> {
        let Some(idx) = self.index.get(&entry) else {
            return Vec::new();
        };
        let mut users: Vec<EntryId> = self
            .graph
            .neighbors_directed(*idx, Direction::Incoming)
            .filter_map(|n| self.graph.node_weight(n).copied())
            .collect();
        users.sort();
        users
    }

    pub fn remove(&mut self, entry: EntryId) {
        if let Some(idx) = self.index.remove(&entry) {
            self.graph.remove_node(idx);
        }
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn clear(&mut self) {
        self.graph.clear();
        self.index.clear();
    }
}
