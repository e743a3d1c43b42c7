//! Concurrent worker mode
//!
//! Independent analyses run on a rayon pool. Each task has its own driver
//! (and call stack) and its own reached set; the summary cache and the
//! shutdown signal are shared. A worker that meets an entry another worker
//! has checked out analyzes that block privately instead of waiting.

mod runner;

pub use runner::{AnalysisTask, ParallelAnalysis, TaskResult};
