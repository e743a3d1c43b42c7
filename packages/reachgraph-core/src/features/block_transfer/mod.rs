/*
 * Block-Modular Transfer Driver
 *
 * Computes successors for one state:
 *   1. At an exit of the block being analyzed: no successors. The caller one
 *      level up picks the exit up when the nested waitlist is empty.
 *   2. At the entry of a block: reduce, consult the summary cache, run,
 *      resume or reuse the nested analysis, expand its exits back.
 *   3. Otherwise: the domain's ordinary transfer relation.
 *
 * Recursion:
 *   A call whose reduced key is already being analyzed further up the call
 *   stack is answered with that frame's current exit approximation. The frame
 *   re-runs its block until the exits stop changing.
 */

mod driver;
mod frame;

pub use crate::features::block_cache::WorkerId;
pub use driver::{AnalysisReport, BlockAnalysis, DriverStatistics};
pub use frame::CallFrame;
