//! Shared models

mod block;
mod cfa;

pub use block::{Block, BlockId, BlockKind, BlockPartitioning, PartitioningBuilder};
pub use cfa::{Cfa, CfaEdge, EdgeId, EdgeKind, FunctionInfo, LocationId};
