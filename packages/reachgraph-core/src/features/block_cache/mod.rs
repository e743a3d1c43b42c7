//! Block-summary cache
//!
//! Memoizes nested block analyses keyed by (reduced entry state, reduced
//! precision, block). A lookup classifies the key as a full hit (exits
//! usable directly), a partial hit (resume the existing nested set), a miss
//! (fresh nested set registered under the key) or busy (another worker holds
//! the entry).
//!
//! Entries are checked out to the worker that runs their nested analysis and
//! checked back in with the outcome, all under one lock.

mod cache;
mod dependency_graph;
mod error;
mod metrics;
mod types;

pub use cache::BlockSummaryCache;
pub use dependency_graph::DependencyGraph;
pub use error::{CacheError, CacheResult};
pub use metrics::BlockCacheMetrics;
pub use types::{
    CacheClass, CacheKey, CacheLookup, CacheStatistics, CheckIn, EntryId, ExitState, WorkerId,
};
