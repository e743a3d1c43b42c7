//! Explicit-value domain
//!
//! Statement labels understood by the transfer relation:
//! - `x = 5`, `x = y`, `x = x + 1`, `x = x - 2`
//! - assumes `x == 5`, `x != 5`, `x < 5`, `x <= 5`, `x > 5`, `x >= 5`
//! - `error` (successor is a target state)
//!
//! Untracked or unknown variables are absent from the map; assumes over
//! them pass.

use reachgraph_core::{
    AbstractDomain, AbstractState, Block, CfaEdge, DomainError, DomainResult, EdgeKind,
    LocationId, Reducer, ShutdownNotifier,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueState {
    pub loc: LocationId,
    pub vars: BTreeMap<String, i64>,
    /// Pending return sites, innermost last
    pub stack: Vec<LocationId>,
    pub error: bool,
}

impl ValueState {
    pub fn at(loc: LocationId) -> Self {
        Self {
            loc,
            vars: BTreeMap::new(),
            stack: Vec::new(),
            error: false,
        }
    }

    pub fn with_var(mut self, name: &str, value: i64) -> Self {
        self.vars.insert(name.to_string(), value);
        self
    }

    pub fn var(&self, name: &str) -> Option<i64> {
        self.vars.get(name).copied()
    }
}

impl AbstractState for ValueState {
    fn location(&self) -> LocationId {
        self.loc
    }

    fn is_target(&self) -> bool {
        self.error
    }
}

/// Tracked variables
pub type Tracked = BTreeSet<String>;

pub fn tracked(names: &[&str]) -> Tracked {
    names.iter().map(|n| n.to_string()).collect()
}

#[derive(Debug, Default)]
pub struct ValueDomain {
    tracked: Tracked,
    /// Requested when an edge with this label is interpreted
    cancel_on: Option<(String, ShutdownNotifier)>,
    pub recursion_entries: AtomicUsize,
    pub recursion_depth: AtomicIsize,
}

impl ValueDomain {
    pub fn new(tracked: Tracked) -> Self {
        Self {
            tracked,
            ..Self::default()
        }
    }

    pub fn cancelling_on(mut self, label: &str, shutdown: ShutdownNotifier) -> Self {
        self.cancel_on = Some((label.to_string(), shutdown));
        self
    }

    fn operand(&self, state: &ValueState, token: &str) -> Option<i64> {
        token.parse::<i64>().ok().or_else(|| state.var(token))
    }

    fn evaluate(&self, state: &ValueState, expr: &str) -> Option<i64> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        match parts.as_slice() {
            [single] => self.operand(state, single),
            [lhs, "+", rhs] => Some(self.operand(state, lhs)? + self.operand(state, rhs)?),
            [lhs, "-", rhs] => Some(self.operand(state, lhs)? - self.operand(state, rhs)?),
            _ => None,
        }
    }

    fn assign(&self, state: &mut ValueState, precision: &Tracked, label: &str, edge: &CfaEdge) -> DomainResult<()> {
        let (var, expr) = label
            .split_once(" = ")
            .ok_or_else(|| DomainError::transfer(edge, "unknown statement"))?;
        let var = var.trim();
        match self.evaluate(state, expr.trim()) {
            Some(value) if precision.contains(var) => {
                state.vars.insert(var.to_string(), value);
            }
            _ => {
                state.vars.remove(var);
            }
        }
        Ok(())
    }

    fn holds(&self, state: &ValueState, label: &str, edge: &CfaEdge) -> DomainResult<bool> {
        let parts: Vec<&str> = label.split_whitespace().collect();
        let [lhs, op, rhs] = parts.as_slice() else {
            return Err(DomainError::transfer(edge, "unknown condition"));
        };
        let (Some(l), Some(r)) = (self.operand(state, lhs), self.operand(state, rhs)) else {
            return Ok(true);
        };
        Ok(match *op {
            "==" => l == r,
            "!=" => l != r,
            "<" => l < r,
            "<=" => l <= r,
            ">" => l > r,
            ">=" => l >= r,
            _ => return Err(DomainError::transfer(edge, "unknown operator")),
        })
    }
}

impl AbstractDomain for ValueDomain {
    type State = ValueState;
    type Precision = Tracked;

    fn initial_state(&self, entry: LocationId) -> ValueState {
        ValueState::at(entry)
    }

    fn initial_precision(&self, _entry: LocationId) -> Tracked {
        self.tracked.clone()
    }

    fn successors(
        &self,
        state: &ValueState,
        precision: &Tracked,
        edge: &CfaEdge,
    ) -> DomainResult<Vec<ValueState>> {
        if let Some((label, shutdown)) = &self.cancel_on {
            if *label == edge.label {
                shutdown.request_shutdown("cancel edge reached");
            }
        }

        let mut next = state.clone();
        next.loc = edge.to;
        match edge.kind {
            EdgeKind::FunctionCall { return_site } => next.stack.push(return_site),
            EdgeKind::FunctionReturn => {
                if next.stack.last() != Some(&edge.to) {
                    return Ok(Vec::new());
                }
                next.stack.pop();
            }
            EdgeKind::Blank => {}
            EdgeKind::Assume => {
                if !self.holds(state, &edge.label, edge)? {
                    return Ok(Vec::new());
                }
            }
            EdgeKind::Statement if edge.label == "error" => next.error = true,
            EdgeKind::Statement if edge.label == "tick" => {}
            EdgeKind::Statement => self.assign(&mut next, precision, &edge.label, edge)?,
        }
        Ok(vec![next])
    }

    fn enter_recursion(&self, _block: &Block) {
        self.recursion_entries.fetch_add(1, Ordering::SeqCst);
        self.recursion_depth.fetch_add(1, Ordering::SeqCst);
    }

    fn leave_recursion(&self, _block: &Block) {
        self.recursion_depth.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Reducer for ValueDomain {
    fn reduce_state(&self, state: &ValueState, block: &Block, entry: LocationId) -> ValueState {
        ValueState {
            loc: entry,
            vars: state
                .vars
                .iter()
                .filter(|(name, _)| block.references(name))
                .map(|(name, value)| (name.clone(), *value))
                .collect(),
            stack: Vec::new(),
            error: state.error,
        }
    }

    fn reduce_precision(&self, precision: &Tracked, block: &Block) -> Tracked {
        precision
            .iter()
            .filter(|name| block.references(name))
            .cloned()
            .collect()
    }

    fn expand_state(
        &self,
        root: &ValueState,
        block: &Block,
        reduced_exit: &ValueState,
    ) -> Option<ValueState> {
        let mut vars: BTreeMap<String, i64> = root
            .vars
            .iter()
            .filter(|(name, _)| !block.references(name))
            .map(|(name, value)| (name.clone(), *value))
            .collect();
        vars.extend(reduced_exit.vars.clone());
        Some(ValueState {
            loc: reduced_exit.loc,
            vars,
            stack: root.stack.clone(),
            error: reduced_exit.error,
        })
    }
}
