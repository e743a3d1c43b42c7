//! Control-flow automaton (CFA) types
//!
//! The CFA is produced by the program front-end and is immutable for a run.
//! Locations are program points, edges carry an opaque statement label that
//! only the plugged-in abstract domain interprets.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;

/// Program location (CFA node)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationId(pub u32);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// CFA edge identifier (index into [`Cfa::edges`])
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// CFA edge kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// No-op edge
    Blank,
    /// Assignment or other side-effecting statement
    Statement,
    /// Branch condition
    Assume,
    /// Call site → callee entry. `return_site` is where control resumes in the caller.
    FunctionCall { return_site: LocationId },
    /// Callee exit → caller return site
    FunctionReturn,
}

/// CFA edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfaEdge {
    pub id: EdgeId,
    pub from: LocationId,
    pub to: LocationId,
    pub kind: EdgeKind,

    /// Statement text, interpreted by the abstract domain
    pub label: String,

    /// Variables read or written by this edge (front-end supplied)
    pub variables: BTreeSet<String>,
}

impl CfaEdge {
    pub fn is_call(&self) -> bool {
        matches!(self.kind, EdgeKind::FunctionCall { .. })
    }

    pub fn is_return(&self) -> bool {
        matches!(self.kind, EdgeKind::FunctionReturn)
    }
}

impl fmt::Display for CfaEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.label, self.to)
    }
}

/// Function descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub entry: LocationId,
    pub exit: LocationId,

    /// Locations belonging to the function body (entry and exit included)
    pub nodes: BTreeSet<LocationId>,
}

/// Control-flow automaton
#[derive(Debug, Clone, Default)]
pub struct Cfa {
    edges: Vec<CfaEdge>,
    outgoing: FxHashMap<LocationId, Vec<EdgeId>>,
    incoming: FxHashMap<LocationId, Vec<EdgeId>>,
    locations: BTreeSet<LocationId>,
    functions: Vec<FunctionInfo>,
    main: Option<usize>,
    next_location: u32,
}

impl Cfa {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh location
    pub fn new_location(&mut self) -> LocationId {
        let loc = LocationId(self.next_location);
        self.next_location += 1;
        self.locations.insert(loc);
        loc
    }

    /// Register an externally numbered location
    pub fn add_location(&mut self, loc: LocationId) {
        self.locations.insert(loc);
        self.next_location = self.next_location.max(loc.0 + 1);
    }

    /// Add an edge and return its id
    pub fn add_edge(
        &mut self,
        from: LocationId,
        to: LocationId,
        kind: EdgeKind,
        label: impl Into<String>,
        variables: &[&str],
    ) -> EdgeId {
        self.add_location(from);
        self.add_location(to);

        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(CfaEdge {
            id,
            from,
            to,
            kind,
            label: label.into(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
        });
        self.outgoing.entry(from).or_default().push(id);
        self.incoming.entry(to).or_default().push(id);
        id
    }

    /// Declare a function by entry/exit; body nodes are computed intraprocedurally
    ///
    /// Call edges are stepped over (call site → return site) and return edges
    /// are not followed, so the body never leaks into callers or callees.
    pub fn add_function(&mut self, name: impl Into<String>, entry: LocationId, exit: LocationId) {
        let nodes = self.intraprocedural_nodes(entry);
        self.functions.push(FunctionInfo {
            name: name.into(),
            entry,
            exit,
            nodes,
        });
    }

    /// Mark a previously added function as the program entry
    pub fn set_main(&mut self, name: &str) -> bool {
        match self.functions.iter().position(|f| f.name == name) {
            Some(idx) => {
                self.main = Some(idx);
                true
            }
            None => false,
        }
    }

    fn intraprocedural_nodes(&self, entry: LocationId) -> BTreeSet<LocationId> {
        let mut nodes = BTreeSet::new();
        let mut queue = VecDeque::from([entry]);

        while let Some(loc) = queue.pop_front() {
            if !nodes.insert(loc) {
                continue;
            }
            for edge in self.outgoing(loc) {
                match edge.kind {
                    EdgeKind::FunctionCall { return_site } => queue.push_back(return_site),
                    EdgeKind::FunctionReturn => {}
                    _ => queue.push_back(edge.to),
                }
            }
        }

        nodes
    }

    pub fn edge(&self, id: EdgeId) -> Option<&CfaEdge> {
        self.edges.get(id.0 as usize)
    }

    pub fn edges(&self) -> &[CfaEdge] {
        &self.edges
    }

    /// Outgoing edges of a location (insertion order)
    pub fn outgoing(&self, loc: LocationId) -> impl Iterator<Item = &CfaEdge> + '_ {
        self.outgoing
            .get(&loc)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.edge(*id))
    }

    /// Incoming edges of a location (insertion order)
    pub fn incoming(&self, loc: LocationId) -> impl Iterator<Item = &CfaEdge> + '_ {
        self.incoming
            .get(&loc)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.edge(*id))
    }

    pub fn locations(&self) -> &BTreeSet<LocationId> {
        &self.locations
    }

    pub fn functions(&self) -> &[FunctionInfo] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn main_function(&self) -> Option<&FunctionInfo> {
        self.main.and_then(|idx| self.functions.get(idx))
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
