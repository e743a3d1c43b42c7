//! Engine configuration
//!
//! Validated knobs for the block-modular reachability engine. Every field has
//! a documented range; `validate()` reports the first violation with a hint.

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

// ============================================================================
// Enumerations
// ============================================================================

/// Order in which waiting states are popped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WaitlistOrder {
    /// Last in, first out
    #[default]
    Dfs,
    /// First in, first out
    Bfs,
    /// Highest `AbstractState::priority()` first, FIFO among equals
    Priority,
}

/// Partition key used to answer merge/coverage candidate queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartitionStrategy {
    /// One partition per control-flow location
    #[default]
    Location,
    /// A single partition holding every state
    Single,
}

/// Whether nested block analyses are memoized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    #[default]
    Always,
    /// Every descent analyzes the block in a private nested set
    Never,
}

// ============================================================================
// EngineConfig
// ============================================================================

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Preset this configuration was derived from
    pub preset: Preset,

    /// Waitlist pop order for every reached set (outer and nested)
    pub waitlist_order: WaitlistOrder,

    /// Candidate partitioning for every reached set
    pub partitioning: PartitionStrategy,

    /// Maximum number of nested block frames (1..=10000)
    pub max_recursion_depth: usize,

    /// Maximum Kleene iterations per recursive block (1..=10000)
    pub max_fixpoint_iterations: usize,

    /// Cache policy for nested analyses
    pub cache_policy: CachePolicy,

    /// Block names that are never cached, whatever the policy
    pub uncached_blocks: BTreeSet<String>,

    /// Stop the worklist loop on the first target state
    pub stop_at_first_target: bool,

    /// Worker threads for the concurrent mode (0=auto, 0..=1024)
    pub worker_threads: usize,

    /// Register prometheus metrics for the summary cache
    pub collect_metrics: bool,
}

impl EngineConfig {
    /// Get preset configuration
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self {
                preset,
                waitlist_order: WaitlistOrder::Dfs,
                partitioning: PartitionStrategy::Location,
                max_recursion_depth: 64,
                max_fixpoint_iterations: 8,
                cache_policy: CachePolicy::Always,
                uncached_blocks: BTreeSet::new(),
                stop_at_first_target: true,
                worker_threads: 0, // Auto
                collect_metrics: false,
            },
            Preset::Balanced => Self {
                preset,
                waitlist_order: WaitlistOrder::Dfs,
                partitioning: PartitionStrategy::Location,
                max_recursion_depth: 256,
                max_fixpoint_iterations: 32,
                cache_policy: CachePolicy::Always,
                uncached_blocks: BTreeSet::new(),
                stop_at_first_target: true,
                worker_threads: 0, // Auto
                collect_metrics: true,
            },
            Preset::Thorough => Self {
                preset,
                waitlist_order: WaitlistOrder::Bfs,
                partitioning: PartitionStrategy::Location,
                max_recursion_depth: 1024,
                max_fixpoint_iterations: 128,
                cache_policy: CachePolicy::Always,
                uncached_blocks: BTreeSet::new(),
                stop_at_first_target: false,
                worker_threads: 0, // Auto
                collect_metrics: true,
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_recursion_depth < 1 || self.max_recursion_depth > 10_000 {
            return Err(ConfigError::range_with_hint(
                "max_recursion_depth",
                self.max_recursion_depth,
                1,
                10_000,
                "At least one block frame is needed; deep stacks usually mean a missing widening",
            ));
        }

        if self.max_fixpoint_iterations < 1 || self.max_fixpoint_iterations > 10_000 {
            return Err(ConfigError::range_with_hint(
                "max_fixpoint_iterations",
                self.max_fixpoint_iterations,
                1,
                10_000,
                "Recursive blocks need at least one iteration to stabilize",
            ));
        }

        if self.worker_threads > 1024 {
            return Err(ConfigError::range_with_hint(
                "worker_threads",
                self.worker_threads,
                0,
                1024,
                "Number of workers must be reasonable (0=auto)",
            ));
        }

        if let Some(name) = self.uncached_blocks.iter().find(|n| n.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "uncached_blocks contains an empty block name ({:?})",
                name
            )));
        }

        Ok(())
    }

    /// Whether the nested analysis of `block_name` goes through the cache
    pub fn caches_block(&self, block_name: &str) -> bool {
        self.cache_policy == CachePolicy::Always && !self.uncached_blocks.contains(block_name)
    }

    /// Worker count with `0` resolved to the number of CPUs
    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            num_cpus::get()
        } else {
            self.worker_threads
        }
    }

    // ------------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------------

    /// Builder: Set waitlist_order
    pub fn waitlist_order(mut self, v: WaitlistOrder) -> Self {
        self.waitlist_order = v;
        self
    }

    /// Builder: Set partitioning
    pub fn partitioning(mut self, v: PartitionStrategy) -> Self {
        self.partitioning = v;
        self
    }

    /// Builder: Set max_recursion_depth
    pub fn max_recursion_depth(mut self, v: usize) -> Self {
        self.max_recursion_depth = v;
        self
    }

    /// Builder: Set max_fixpoint_iterations
    pub fn max_fixpoint_iterations(mut self, v: usize) -> Self {
        self.max_fixpoint_iterations = v;
        self
    }

    /// Builder: Set cache_policy
    pub fn cache_policy(mut self, v: CachePolicy) -> Self {
        self.cache_policy = v;
        self
    }

    /// Builder: Never cache the named block
    pub fn uncached_block(mut self, name: impl Into<String>) -> Self {
        self.uncached_blocks.insert(name.into());
        self
    }

    /// Builder: Set stop_at_first_target
    pub fn stop_at_first_target(mut self, v: bool) -> Self {
        self.stop_at_first_target = v;
        self
    }

    /// Builder: Set worker_threads
    pub fn worker_threads(mut self, v: usize) -> Self {
        self.worker_threads = v;
        self
    }

    /// Builder: Set collect_metrics
    pub fn collect_metrics(mut self, v: bool) -> Self {
        self.collect_metrics = v;
        self
    }

    // ------------------------------------------------------------------------
    // YAML
    // ------------------------------------------------------------------------

    /// Parse and validate a YAML document
    ///
    /// Missing fields fall back to the Balanced preset.
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        serde_yaml::to_string(self).map_err(ConfigError::Yaml)
    }

    /// Get a human-readable description of the configuration
    pub fn describe(&self) -> String {
        format!(
            "preset={} order={:?} partitioning={:?} depth<={} fixpoint<={} cache={:?} uncached={} workers={}",
            self.preset,
            self.waitlist_order,
            self.partitioning,
            self.max_recursion_depth,
            self.max_fixpoint_iterations,
            self.cache_policy,
            self.uncached_blocks.len(),
            self.worker_threads,
        )
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}
