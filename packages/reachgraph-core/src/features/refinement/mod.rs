//! Refinement entry points
//!
//! A refinement loop that found a spurious counterexample prunes the ARG
//! below the first infeasible node and re-explores it, possibly with a finer
//! precision. Inside a cached block the same pruning turns the entry back
//! into a partial hit and drops every entry built on its old exits.

mod subtree;

pub use subtree::{invalidate_block, remove_subtree, remove_subtree_in_block, RemovedSubtree};
