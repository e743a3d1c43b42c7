//! Feature modules
//!
//! Leaves first:
//! - reached_set     - states with precisions, waitlist, candidate partitions
//! - arg             - abstract reachability graph arena over a reached set
//! - block_cache     - memoized nested analyses keyed by reduced entry
//! - cpa_algorithm   - worklist loop
//! - block_transfer  - block-modular successor computation
//! - reconstruction  - counterexample paths through cached blocks
//! - refinement      - subtree removal and cache invalidation
//! - parallel        - concurrent workers over one shared cache

pub mod arg;
pub mod block_cache;
pub mod block_transfer;
pub mod cpa_algorithm;
pub mod reached_set;
pub mod reconstruction;
pub mod refinement;

// Concurrent worker mode (rayon pool sharing one summary cache)
#[cfg(feature = "parallel")]
pub mod parallel;
