//! CPA worklist algorithm
//!
//! Pops a waiting node, asks a [`TransferRelation`] for its successors and
//! feeds each one through merge, stop and add. Finding a target state is
//! reported as [`StepOutcome::BreakEarly`], not as an error.

mod algorithm;
mod transfer;

pub use algorithm::{BreakReason, CpaAlgorithm, RunOutcome, StepOutcome};
pub use transfer::{AbstractSuccessor, PlainTransfer, TransferRelation};
