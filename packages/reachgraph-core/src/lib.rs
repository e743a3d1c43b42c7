/*
 * Reachgraph Core - Block-Modular Reachability Engine
 *
 * Feature-First Architecture:
 * - shared/      : Common models (locations, CFA, blocks) and domain ports
 * - features/    : Vertical slices (reached set → ARG → cache → driver → reconstruction)
 * - config/      : Engine configuration (presets, YAML, validation)
 *
 * The engine partitions a control-flow automaton into blocks, analyzes each
 * block once per (reduced entry state, reduced precision) pair, memoizes the
 * nested reached set, and stitches the per-block results back into the
 * caller's abstract reachability graph.
 */

#![allow(clippy::type_complexity)] // Generic cache keys are verbose
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::module_inception)] // Module naming intentional

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models, domain ports and the shutdown signal
pub mod shared;

/// Feature modules (reached set, ARG, cache, driver, reconstruction, refinement)
pub mod features;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{CachePolicy, ConfigError, EngineConfig, PartitionStrategy, Preset, WaitlistOrder};
pub use errors::{EngineError, EngineResult};
pub use features::arg::{ArgEdge, ArgReachedSet, ExpansionRecord, NodeId};
pub use features::block_cache::{
    BlockSummaryCache, CacheClass, CacheKey, CacheLookup, CacheStatistics, CheckIn, EntryId,
    ExitState,
};
pub use features::block_transfer::{AnalysisReport, BlockAnalysis, DriverStatistics, WorkerId};
pub use features::cpa_algorithm::{BreakReason, CpaAlgorithm, PlainTransfer, RunOutcome, StepOutcome, TransferRelation};
pub use features::reached_set::{ConcurrentReachedSet, ReachedSet};
pub use features::reconstruction::{CounterexamplePath, CounterexampleReconstructor, PathStep};
pub use features::refinement::{invalidate_block, remove_subtree, remove_subtree_in_block, RemovedSubtree};
pub use shared::models::{
    Block, BlockId, BlockKind, BlockPartitioning, Cfa, CfaEdge, EdgeId, EdgeKind, FunctionInfo,
    LocationId,
};
pub use shared::ports::{AbstractDomain, AbstractPrecision, AbstractState, DomainError, DomainResult, Reducer};
pub use shared::shutdown::ShutdownNotifier;

#[cfg(feature = "parallel")]
pub use features::parallel::{AnalysisTask, ParallelAnalysis, TaskResult};
