//! Blocks and block partitioning
//!
//! A block is a syntactic CFA region with distinguished entry (call) and exit
//! (return) locations. The partitioning is built once from the CFA and shared
//! immutably (`Arc<BlockPartitioning>`) by every analysis of a run.

use super::cfa::{Cfa, EdgeKind, LocationId};
use crate::errors::{EngineError, EngineResult};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Block identifier (index into the partitioning)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// How a block was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Function,
    Loop,
    Custom,
}

/// Control-flow region analyzed and cached as a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    pub kind: BlockKind,
    pub entry_nodes: BTreeSet<LocationId>,
    pub exit_nodes: BTreeSet<LocationId>,
    pub nodes: BTreeSet<LocationId>,

    /// Variables referenced inside the block, including blocks it calls
    pub variables: BTreeSet<String>,
}

impl Block {
    pub fn is_entry(&self, loc: LocationId) -> bool {
        self.entry_nodes.contains(&loc)
    }

    pub fn is_exit(&self, loc: LocationId) -> bool {
        self.exit_nodes.contains(&loc)
    }

    pub fn contains(&self, loc: LocationId) -> bool {
        self.nodes.contains(&loc)
    }

    pub fn references(&self, variable: &str) -> bool {
        self.variables.contains(variable)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.id)
    }
}

/// Immutable block partitioning of a CFA
#[derive(Debug, Clone, Default)]
pub struct BlockPartitioning {
    blocks: Vec<Block>,
    by_entry: FxHashMap<LocationId, BlockId>,
    main: Option<BlockId>,
}

impl BlockPartitioning {
    /// Start building a partitioning over `cfa`
    pub fn builder(cfa: &Cfa) -> PartitioningBuilder<'_> {
        PartitioningBuilder::new(cfa)
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0 as usize)
    }

    /// Block whose entry node is `loc`, if any
    pub fn block_for_entry(&self, loc: LocationId) -> Option<&Block> {
        self.by_entry.get(&loc).and_then(|id| self.block(*id))
    }

    pub fn is_entry(&self, loc: LocationId) -> bool {
        self.by_entry.contains_key(&loc)
    }

    pub fn block_by_name(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }

    /// The outermost block (program entry function), if declared
    pub fn main_block(&self) -> Option<&Block> {
        self.main.and_then(|id| self.block(id))
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

struct PendingBlock {
    name: String,
    kind: BlockKind,
    entry_nodes: BTreeSet<LocationId>,
    exit_nodes: BTreeSet<LocationId>,
    nodes: BTreeSet<LocationId>,
}

/// Builder for [`BlockPartitioning`]
///
/// Function blocks come from the CFA's function descriptors, loop blocks from
/// strongly connected components of each function body, and custom blocks
/// from the caller. Referenced variables are closed over nested calls.
pub struct PartitioningBuilder<'a> {
    cfa: &'a Cfa,
    pending: Vec<PendingBlock>,
    main: Option<String>,
}

impl<'a> PartitioningBuilder<'a> {
    pub fn new(cfa: &'a Cfa) -> Self {
        Self {
            cfa,
            pending: Vec::new(),
            main: cfa.main_function().map(|f| f.name.clone()),
        }
    }

    /// One block per function body
    pub fn with_functions(mut self) -> Self {
        for function in self.cfa.functions() {
            self.pending.push(PendingBlock {
                name: function.name.clone(),
                kind: BlockKind::Function,
                entry_nodes: BTreeSet::from([function.entry]),
                exit_nodes: BTreeSet::from([function.exit]),
                nodes: function.nodes.clone(),
            });
        }
        self
    }

    /// Only the named functions become blocks (the main function is always included)
    pub fn with_function_blocks(mut self, names: &[&str]) -> Self {
        for function in self.cfa.functions() {
            let is_main = self.main.as_deref() == Some(function.name.as_str());
            if !is_main && !names.contains(&function.name.as_str()) {
                continue;
            }
            self.pending.push(PendingBlock {
                name: function.name.clone(),
                kind: BlockKind::Function,
                entry_nodes: BTreeSet::from([function.entry]),
                exit_nodes: BTreeSet::from([function.exit]),
                nodes: function.nodes.clone(),
            });
        }
        self
    }

    /// One block per natural loop (SCC with a single head) inside each function
    ///
    /// The loop head is the entry; locations outside the SCC that are targets
    /// of edges leaving it are the exits. Loops with several heads are skipped.
    pub fn with_loops(mut self) -> Self {
        for function in self.cfa.functions() {
            let mut graph: DiGraph<LocationId, ()> = DiGraph::new();
            let mut index: FxHashMap<LocationId, NodeIndex> = FxHashMap::default();
            for loc in &function.nodes {
                index.insert(*loc, graph.add_node(*loc));
            }
            for loc in &function.nodes {
                for edge in self.cfa.outgoing(*loc) {
                    let target = match edge.kind {
                        EdgeKind::FunctionCall { return_site } => return_site,
                        EdgeKind::FunctionReturn => continue,
                        _ => edge.to,
                    };
                    if let (Some(a), Some(b)) = (index.get(loc), index.get(&target)) {
                        graph.add_edge(*a, *b, ());
                    }
                }
            }

            for (n, scc) in tarjan_scc(&graph).into_iter().enumerate() {
                let nodes: BTreeSet<LocationId> = scc.iter().map(|idx| graph[*idx]).collect();
                let is_loop = nodes.len() > 1
                    || scc
                        .first()
                        .map(|idx| graph.contains_edge(*idx, *idx))
                        .unwrap_or(false);
                if !is_loop {
                    continue;
                }

                let heads: BTreeSet<LocationId> = nodes
                    .iter()
                    .copied()
                    .filter(|loc| {
                        *loc == function.entry
                            || self
                                .cfa
                                .incoming(*loc)
                                .any(|e| !e.is_return() && !nodes.contains(&e.from))
                    })
                    .collect();
                if heads.len() != 1 {
                    tracing::debug!(
                        "Skipping loop in {} with {} heads",
                        function.name,
                        heads.len()
                    );
                    continue;
                }

                let mut exits = BTreeSet::new();
                for loc in &nodes {
                    for edge in self.cfa.outgoing(*loc) {
                        let target = match edge.kind {
                            EdgeKind::FunctionCall { return_site } => return_site,
                            EdgeKind::FunctionReturn => continue,
                            _ => edge.to,
                        };
                        if !nodes.contains(&target) {
                            exits.insert(target);
                        }
                    }
                }

                let mut block_nodes = nodes;
                block_nodes.extend(exits.iter().copied());
                self.pending.push(PendingBlock {
                    name: format!("{}#loop{}", function.name, n),
                    kind: BlockKind::Loop,
                    entry_nodes: heads,
                    exit_nodes: exits,
                    nodes: block_nodes,
                });
            }
        }
        self
    }

    /// Add an explicit block
    pub fn with_block(
        mut self,
        name: impl Into<String>,
        entry_nodes: impl IntoIterator<Item = LocationId>,
        exit_nodes: impl IntoIterator<Item = LocationId>,
        nodes: impl IntoIterator<Item = LocationId>,
    ) -> Self {
        let entry_nodes: BTreeSet<LocationId> = entry_nodes.into_iter().collect();
        let exit_nodes: BTreeSet<LocationId> = exit_nodes.into_iter().collect();
        let mut nodes: BTreeSet<LocationId> = nodes.into_iter().collect();
        nodes.extend(entry_nodes.iter().copied());
        nodes.extend(exit_nodes.iter().copied());
        self.pending.push(PendingBlock {
            name: name.into(),
            kind: BlockKind::Custom,
            entry_nodes,
            exit_nodes,
            nodes,
        });
        self
    }

    /// Override the main block name
    pub fn with_main(mut self, name: impl Into<String>) -> Self {
        self.main = Some(name.into());
        self
    }

    /// Validate and freeze the partitioning
    ///
    /// Fails if two blocks share an entry location or a block has no entry.
    pub fn build(self) -> EngineResult<BlockPartitioning> {
        let mut blocks = Vec::with_capacity(self.pending.len());
        let mut by_entry = FxHashMap::default();

        for (idx, pending) in self.pending.into_iter().enumerate() {
            let id = BlockId(idx as u32);
            if pending.entry_nodes.is_empty() {
                return Err(EngineError::Partitioning(format!(
                    "block '{}' has no entry node",
                    pending.name
                )));
            }
            for entry in &pending.entry_nodes {
                if let Some(other) = by_entry.insert(*entry, id) {
                    return Err(EngineError::Partitioning(format!(
                        "entry {} of block '{}' already belongs to {}",
                        entry, pending.name, other
                    )));
                }
            }

            let mut variables = BTreeSet::new();
            for loc in &pending.nodes {
                for edge in self.cfa.outgoing(*loc) {
                    if !edge.is_return() {
                        variables.extend(edge.variables.iter().cloned());
                    }
                }
            }

            blocks.push(Block {
                id,
                name: pending.name,
                kind: pending.kind,
                entry_nodes: pending.entry_nodes,
                exit_nodes: pending.exit_nodes,
                nodes: pending.nodes,
                variables,
            });
        }

        close_variables_over_calls(self.cfa, &mut blocks, &by_entry);

        let main = self
            .main
            .as_deref()
            .and_then(|name| blocks.iter().find(|b| b.name == name))
            .map(|b| b.id);

        Ok(BlockPartitioning {
            blocks,
            by_entry,
            main,
        })
    }
}

/// Propagate callee variables into every block that can reach the callee's entry
fn close_variables_over_calls(
    cfa: &Cfa,
    blocks: &mut [Block],
    by_entry: &FxHashMap<LocationId, BlockId>,
) {
    let callees: Vec<BTreeSet<BlockId>> = blocks
        .iter()
        .map(|block| {
            block
                .nodes
                .iter()
                .flat_map(|loc| cfa.outgoing(*loc))
                .filter_map(|edge| by_entry.get(&edge.to).copied())
                .filter(|callee| *callee != block.id)
                .collect()
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for idx in 0..blocks.len() {
            let mut inherited = BTreeSet::new();
            for callee in &callees[idx] {
                inherited.extend(blocks[callee.0 as usize].variables.iter().cloned());
            }
            let before = blocks[idx].variables.len();
            blocks[idx].variables.extend(inherited);
            changed |= blocks[idx].variables.len() != before;
        }
    }
}
