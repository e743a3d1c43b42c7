//! Error types for reachgraph-core
//!
//! Provides unified error handling across the crate.

use crate::config::ConfigError;
use crate::features::block_cache::CacheError;
use crate::shared::ports::DomainError;
use thiserror::Error;

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// A known state was re-inserted with a different precision (caller bug)
    #[error("Precision conflict: state {state} is already reached with another precision")]
    PrecisionConflict { state: String },

    /// Pop on an empty waitlist (programming error)
    #[error("Waitlist is empty")]
    EmptyWaitlist,

    /// Reconstruction needs a cache entry that is absent, invalidated or pending
    #[error("Missing block summary for {block}: {reason}")]
    MissingBlockSummary { block: String, reason: String },

    /// Failure inside a nested block analysis, wrapped with the recursion depth
    #[error("Nested analysis of {block} failed at recursion depth {depth}: {source}")]
    RecursiveAnalysisFailure {
        depth: usize,
        block: String,
        #[source]
        source: Box<EngineError>,
    },

    /// Cooperative shutdown mid-analysis
    #[error("Analysis cancelled: {reason}")]
    Cancelled { reason: String },

    /// Call stack grew beyond the configured bound
    #[error("Recursion depth {depth} exceeds the configured maximum {max_depth}")]
    RecursionDepthExceeded { depth: usize, max_depth: usize },

    /// Recursive block summary did not stabilize
    #[error("Fixpoint for {block} did not converge after {iterations} iterations")]
    FixpointNotConverged { block: String, iterations: usize },

    /// Node id does not exist (or was removed) in the reached set
    #[error("Unknown ARG node {0}")]
    UnknownNode(u32),

    /// Refinement touched a cache entry that is checked out by an analysis
    #[error("Cache entry for {block} is in use by a running analysis")]
    EntryInUse { block: String },

    /// Invalid block partitioning
    #[error("Partitioning error: {0}")]
    Partitioning(String),

    /// Domain error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cache bookkeeping error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Statistics export error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Worker pool could not be started
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl EngineError {
    /// Cooperative shutdown, reported distinctly from true failures
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::RecursiveAnalysisFailure { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }

    /// Errors the outer loop can recover from by re-running the analysis
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MissingBlockSummary { .. })
    }

    /// Wrap a nested-analysis failure with the recursion depth
    ///
    /// Cancellation and already-wrapped failures pass through unchanged, so the
    /// innermost depth is the one reported.
    pub fn wrap_recursive(self, depth: usize, block: &str) -> Self {
        match self {
            Self::Cancelled { .. } | Self::RecursiveAnalysisFailure { .. } => self,
            other => Self::RecursiveAnalysisFailure {
                depth,
                block: block.to_string(),
                source: Box::new(other),
            },
        }
    }

    pub fn missing_summary(block: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MissingBlockSummary {
            block: block.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;
