//! Worklist loop with merge, stop and add

use super::transfer::{AbstractSuccessor, TransferRelation};
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::features::arg::{ArgReachedSet, NodeId};
use crate::shared::ports::{AbstractDomain, AbstractState, PrecisionOf, StateOf};
use crate::shared::shutdown::ShutdownNotifier;
#[cfg(feature = "trace")]
use tracing::trace;

/// Why a run stopped before the waitlist was empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakReason {
    TargetFound(NodeId),
}

/// Result of draining a reached set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Waitlist is empty
    Exhausted,
    BreakEarly(BreakReason),
}

impl RunOutcome {
    pub fn target(&self) -> Option<NodeId> {
        match self {
            Self::Exhausted => None,
            Self::BreakEarly(BreakReason::TargetFound(node)) => Some(*node),
        }
    }
}

/// Result of one algorithm step
#[derive(Debug)]
pub enum StepOutcome {
    Continue,
    BreakEarly(BreakReason),
    Fail(EngineError),
}

#[derive(Debug, Clone)]
pub struct CpaAlgorithm {
    stop_at_first_target: bool,
    shutdown: ShutdownNotifier,
}

impl CpaAlgorithm {
    pub fn new(stop_at_first_target: bool, shutdown: ShutdownNotifier) -> Self {
        Self {
            stop_at_first_target,
            shutdown,
        }
    }

    pub fn from_config(config: &EngineConfig, shutdown: ShutdownNotifier) -> Self {
        Self::new(config.stop_at_first_target, shutdown)
    }

    /// Step until the waitlist is empty, a target is found or a step fails
    pub fn run<T: TransferRelation>(
        &self,
        transfer: &mut T,
        reached: &mut ArgReachedSet<StateOf<T::Domain>, PrecisionOf<T::Domain>>,
    ) -> EngineResult<RunOutcome> {
        while reached.has_waiting_state() {
            match self.step(transfer, reached) {
                StepOutcome::Continue => {}
                StepOutcome::BreakEarly(reason) => return Ok(RunOutcome::BreakEarly(reason)),
                StepOutcome::Fail(err) => return Err(err),
            }
        }
        Ok(RunOutcome::Exhausted)
    }

    /// Pop one node and process its successors
    ///
    /// A failing or interrupted step puts the popped node back on the
    /// waitlist, so the set can be resumed later.
    pub fn step<T: TransferRelation>(
        &self,
        transfer: &mut T,
        reached: &mut ArgReachedSet<StateOf<T::Domain>, PrecisionOf<T::Domain>>,
    ) -> StepOutcome {
        if let Err(err) = self.shutdown.check() {
            return StepOutcome::Fail(err);
        }
        let mut node = match reached.pop_from_waitlist() {
            Ok(node) => node,
            Err(err) => return StepOutcome::Fail(err),
        };

        #[cfg(feature = "trace")]
        trace!(node = %node, state = ?reached.state(node), "popped");

        let successors = match transfer.successors(reached, node) {
            Ok(successors) => successors,
            Err(err) => {
                reached.re_add_to_waitlist(node);
                return StepOutcome::Fail(err);
            }
        };

        let total = successors.len();
        for (i, successor) in successors.into_iter().enumerate() {
            match self.process_successor(transfer.domain(), reached, &mut node, successor) {
                Ok(Some(target)) if self.stop_at_first_target => {
                    if i + 1 < total {
                        reached.re_add_to_waitlist(node);
                    }
                    return StepOutcome::BreakEarly(BreakReason::TargetFound(target));
                }
                Ok(_) => {}
                Err(err) => {
                    reached.re_add_to_waitlist(node);
                    return StepOutcome::Fail(err);
                }
            }
        }
        StepOutcome::Continue
    }

    /// Merge, stop, add; returns the new node if it is a target
    fn process_successor<D: AbstractDomain>(
        &self,
        domain: &D,
        reached: &mut ArgReachedSet<D::State, D::Precision>,
        parent: &mut NodeId,
        successor: AbstractSuccessor<D::State, D::Precision>,
    ) -> EngineResult<Option<NodeId>> {
        let AbstractSuccessor {
            state,
            precision,
            edge,
        } = successor;

        let candidates: Vec<(NodeId, D::State)> = reached
            .candidates(&state)
            .map(|(id, s)| (id, s.clone()))
            .collect();
        for (id, existing) in &candidates {
            if *existing == state || !reached.is_reached(*id) {
                continue;
            }
            let merged = domain.merge(&state, existing, &precision)?;
            if merged != *existing {
                let replacement = reached.replace_with_merged(
                    *id,
                    merged,
                    precision.clone(),
                    *parent,
                    edge.clone(),
                )?;
                if *parent == *id {
                    *parent = replacement;
                }
            }
        }

        let candidates: Vec<(NodeId, D::State)> = reached
            .candidates(&state)
            .map(|(id, s)| (id, s.clone()))
            .collect();
        for (id, existing) in candidates {
            if domain.is_less_or_equal(&state, &existing)? {
                reached.add_covered_leaf(*parent, state, edge, id)?;
                return Ok(None);
            }
        }

        let is_target = state.is_target();
        let id = reached.add_successor(*parent, state, precision, edge)?;
        Ok(is_target.then_some(id))
    }
}
