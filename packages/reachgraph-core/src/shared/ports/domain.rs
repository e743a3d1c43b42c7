//! Abstract domain contract consumed by the engine

use crate::shared::models::{Block, CfaEdge, LocationId};
use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

/// Failure reported by a plugged-in abstract domain
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// Transfer relation could not interpret an edge
    #[error("Transfer failed on {edge}: {message}")]
    Transfer { edge: String, message: String },

    /// Reduction of a state or precision failed
    #[error("Reduction failed for block {block}: {message}")]
    Reduction { block: String, message: String },

    /// Any other domain failure
    #[error("Domain error: {0}")]
    Other(String),
}

impl DomainError {
    pub fn transfer(edge: &CfaEdge, message: impl Into<String>) -> Self {
        Self::Transfer {
            edge: edge.to_string(),
            message: message.into(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Opaque abstract state
///
/// Equality and hashing must be structural: two states that compare equal are
/// the same element of a reached set and the same cache key component.
pub trait AbstractState: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// Control-flow location of this state
    fn location(&self) -> LocationId;

    /// Whether this state violates the checked property
    fn is_target(&self) -> bool {
        false
    }

    /// Waitlist priority (higher pops first under `WaitlistOrder::Priority`)
    fn priority(&self) -> i64 {
        0
    }
}

/// Opaque precision paired 1:1 with a reached state
pub trait AbstractPrecision: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> AbstractPrecision for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Abstract domain with transfer, merge and stop operators
pub trait AbstractDomain: Send + Sync {
    type State: AbstractState;
    type Precision: AbstractPrecision;

    /// Initial state at the program entry
    fn initial_state(&self, entry: LocationId) -> Self::State;

    /// Initial precision at the program entry
    fn initial_precision(&self, entry: LocationId) -> Self::Precision;

    /// Ordinary successors of `state` along `edge`
    fn successors(
        &self,
        state: &Self::State,
        precision: &Self::Precision,
        edge: &CfaEdge,
    ) -> DomainResult<Vec<Self::State>>;

    /// Merge `state` into `reached`; returning `reached` unchanged means "keep separate"
    fn merge(
        &self,
        _state: &Self::State,
        reached: &Self::State,
        _precision: &Self::Precision,
    ) -> DomainResult<Self::State> {
        Ok(reached.clone())
    }

    /// Coverage check used by stop: is `state` subsumed by `reached`?
    fn is_less_or_equal(&self, state: &Self::State, reached: &Self::State) -> DomainResult<bool> {
        Ok(state == reached)
    }

    /// Called before descending into `block` while it is already on the call stack
    fn enter_recursion(&self, _block: &Block) {}

    /// Retracts [`AbstractDomain::enter_recursion`] after the descent returns
    fn leave_recursion(&self, _block: &Block) {}
}

/// State type of a domain
pub type StateOf<D> = <D as AbstractDomain>::State;

/// Precision type of a domain
pub type PrecisionOf<D> = <D as AbstractDomain>::Precision;

/// Block-local projection and lifting
///
/// `reduce_*` must be deterministic: observationally equivalent outer states
/// reduce to equal results, which is what makes memoization sound.
pub trait Reducer: AbstractDomain {
    /// Project `state` to the information relevant inside `block`
    fn reduce_state(&self, state: &Self::State, block: &Block, entry: LocationId) -> Self::State;

    /// Project `precision` to the information relevant inside `block`
    fn reduce_precision(&self, precision: &Self::Precision, block: &Block) -> Self::Precision;

    /// Lift a block-local exit back into the context of `root`
    ///
    /// Returns `None` when the exit is infeasible in that context.
    fn expand_state(
        &self,
        root: &Self::State,
        block: &Block,
        reduced_exit: &Self::State,
    ) -> Option<Self::State>;

    /// Lift the precision of a block-local exit back into the caller's context
    fn expand_precision(
        &self,
        outer: &Self::Precision,
        _block: &Block,
        _reduced_exit: &Self::Precision,
    ) -> Self::Precision {
        outer.clone()
    }
}
