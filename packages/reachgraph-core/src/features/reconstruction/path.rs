//! Flattened counterexample paths

use crate::shared::models::{Cfa, EdgeId, LocationId};
use serde::Serialize;

/// One state of a flattened path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathStep<S> {
    pub state: S,
    pub location: LocationId,
    /// CFA edge from the previous step; `None` only on the first step
    pub incoming: Option<EdgeId>,
}

/// Path from the program entry to a target over CFA edges only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterexamplePath<S> {
    steps: Vec<PathStep<S>>,
}

impl<S> CounterexamplePath<S> {
    pub fn new(steps: Vec<PathStep<S>>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PathStep<S>] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<PathStep<S>> {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.steps.iter().filter(|s| s.incoming.is_some()).count()
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.steps.iter().filter_map(|s| s.incoming)
    }

    pub fn locations(&self) -> Vec<LocationId> {
        self.steps.iter().map(|s| s.location).collect()
    }

    pub fn states(&self) -> impl Iterator<Item = &S> + '_ {
        self.steps.iter().map(|s| &s.state)
    }

    pub fn first(&self) -> Option<&S> {
        self.steps.first().map(|s| &s.state)
    }

    pub fn target(&self) -> Option<&S> {
        self.steps.last().map(|s| &s.state)
    }

    /// Every step after the first is reached from its predecessor by its
    /// incoming CFA edge
    pub fn is_connected(&self, cfa: &Cfa) -> bool {
        if self.steps.first().map_or(false, |s| s.incoming.is_some()) {
            return false;
        }
        self.steps.windows(2).all(|pair| {
            pair[1]
                .incoming
                .and_then(|id| cfa.edge(id))
                .map_or(false, |edge| edge.from == pair[0].location && edge.to == pair[1].location)
        })
    }
}
