//! Domain ports
//!
//! The engine is generic over the abstract domain. A domain supplies the
//! state/precision types, the ordinary transfer relation, merge and stop, and
//! (through [`Reducer`]) the block-local projection used as cache key.

mod domain;

pub use domain::{
    AbstractDomain, AbstractPrecision, AbstractState, DomainError, DomainResult, PrecisionOf,
    Reducer, StateOf,
};
