//! Successor computation seam

use crate::errors::{EngineError, EngineResult};
use crate::features::arg::{ArgEdge, ArgReachedSet, NodeId};
use crate::shared::models::Cfa;
use crate::shared::ports::{AbstractDomain, AbstractState, PrecisionOf, StateOf};
use std::sync::Arc;

/// One successor with the ARG edge that produced it
#[derive(Debug, Clone)]
pub struct AbstractSuccessor<S: AbstractState, P> {
    pub state: S,
    pub precision: P,
    pub edge: ArgEdge<S, P>,
}

/// Successor computation consumed by [`CpaAlgorithm`](super::CpaAlgorithm)
pub trait TransferRelation {
    type Domain: AbstractDomain;

    /// Domain used for merge and stop
    fn domain(&self) -> &Self::Domain;

    /// Successors of the reached node `node`
    fn successors(
        &mut self,
        reached: &ArgReachedSet<StateOf<Self::Domain>, PrecisionOf<Self::Domain>>,
        node: NodeId,
    ) -> EngineResult<Vec<AbstractSuccessor<StateOf<Self::Domain>, PrecisionOf<Self::Domain>>>>;
}

/// Ordinary transfer over every outgoing CFA edge, no block handling
///
/// Analyzes the whole program as one block; calls are followed inline.
pub struct PlainTransfer<D: AbstractDomain> {
    domain: Arc<D>,
    cfa: Arc<Cfa>,
}

impl<D: AbstractDomain> PlainTransfer<D> {
    pub fn new(domain: Arc<D>, cfa: Arc<Cfa>) -> Self {
        Self { domain, cfa }
    }
}

impl<D: AbstractDomain> TransferRelation for PlainTransfer<D> {
    type Domain = D;

    fn domain(&self) -> &D {
        &self.domain
    }

    fn successors(
        &mut self,
        reached: &ArgReachedSet<D::State, D::Precision>,
        node: NodeId,
    ) -> EngineResult<Vec<AbstractSuccessor<D::State, D::Precision>>> {
        let (Some(state), Some(precision)) = (reached.state(node), reached.precision(node)) else {
            return Err(EngineError::UnknownNode(node.0));
        };
        let mut out = Vec::new();
        for edge in self.cfa.outgoing(state.location()) {
            for succ in self.domain.successors(state, precision, edge)? {
                out.push(AbstractSuccessor {
                    state: succ,
                    precision: precision.clone(),
                    edge: ArgEdge::Cfa(edge.id),
                });
            }
        }
        Ok(out)
    }
}
