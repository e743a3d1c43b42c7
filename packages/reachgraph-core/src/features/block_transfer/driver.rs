//! Block-modular successor computation

use super::frame::CallFrame;
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::features::arg::{ArgEdge, ArgReachedSet, ExpansionRecord, NodeId};
use crate::features::block_cache::{
    BlockSummaryCache, CacheKey, CacheLookup, CacheStatistics, CheckIn, EntryId, ExitState,
    WorkerId,
};
use crate::features::cpa_algorithm::{
    AbstractSuccessor, CpaAlgorithm, RunOutcome, StepOutcome, TransferRelation,
};
use crate::features::reconstruction::{CounterexamplePath, CounterexampleReconstructor};
use crate::shared::models::{Block, BlockPartitioning, Cfa, LocationId};
use crate::shared::ports::{AbstractState, PrecisionOf, Reducer, StateOf};
use crate::shared::shutdown::ShutdownNotifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

type Successors<D> = Vec<AbstractSuccessor<StateOf<D>, PrecisionOf<D>>>;
type Exits<D> = Vec<ExitState<StateOf<D>, PrecisionOf<D>>>;
type NestedSet<D> = ArgReachedSet<StateOf<D>, PrecisionOf<D>>;

/// Counters of one driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStatistics {
    pub descents: u64,
    pub recursive_descents: u64,
    pub approximated_calls: u64,
    pub private_analyses: u64,
    pub fixpoint_restarts: u64,
    pub infeasible_expansions: u64,
    pub max_depth: usize,
}

/// Driver and cache counters, as exported after a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub worker: WorkerId,
    pub driver: DriverStatistics,
    pub cache: CacheStatistics,
    pub hit_rate: f64,
}

impl AnalysisReport {
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Block-modular transfer driver
///
/// One driver per worker. The call stack is private to the driver; the
/// summary cache is shared.
pub struct BlockAnalysis<D: Reducer> {
    domain: Arc<D>,
    cfa: Arc<Cfa>,
    partitioning: Arc<BlockPartitioning>,
    cache: Arc<BlockSummaryCache<D::State, D::Precision>>,
    config: EngineConfig,
    shutdown: ShutdownNotifier,
    worker: WorkerId,
    stack: Vec<CallFrame<D::State, D::Precision>>,
    statistics: DriverStatistics,
}

impl<D: Reducer> BlockAnalysis<D> {
    pub fn new(
        domain: Arc<D>,
        cfa: Arc<Cfa>,
        partitioning: Arc<BlockPartitioning>,
        cache: Arc<BlockSummaryCache<D::State, D::Precision>>,
        config: EngineConfig,
        shutdown: ShutdownNotifier,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            domain,
            cfa,
            partitioning,
            cache,
            config,
            shutdown,
            worker: WorkerId::default(),
            stack: Vec::new(),
            statistics: DriverStatistics::default(),
        })
    }

    pub fn with_worker(mut self, worker: WorkerId) -> Self {
        self.worker = worker;
        self
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn cache(&self) -> &Arc<BlockSummaryCache<D::State, D::Precision>> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cfa(&self) -> &Arc<Cfa> {
        &self.cfa
    }

    pub fn partitioning(&self) -> &Arc<BlockPartitioning> {
        &self.partitioning
    }

    pub fn statistics(&self) -> &DriverStatistics {
        &self.statistics
    }

    pub fn report(&self) -> AnalysisReport {
        let cache = self.cache.statistics();
        AnalysisReport {
            worker: self.worker,
            driver: self.statistics.clone(),
            hit_rate: cache.hit_rate(),
            cache,
        }
    }

    pub fn call_stack(&self) -> &[CallFrame<D::State, D::Precision>] {
        &self.stack
    }

    /// Reached set seeded with the domain's initial state at `entry`
    pub fn reached_set_at(&self, entry: LocationId) -> NestedSet<D> {
        ArgReachedSet::with_root(
            self.config.waitlist_order,
            self.config.partitioning,
            self.domain.initial_state(entry),
            self.domain.initial_precision(entry),
        )
    }

    /// Reached set seeded at the entry of the main function
    pub fn initial_reached_set(&self) -> EngineResult<NestedSet<D>> {
        let entry = self
            .cfa
            .main_function()
            .map(|f| f.entry)
            .ok_or_else(|| EngineError::Partitioning("CFA has no main function".to_string()))?;
        Ok(self.reached_set_at(entry))
    }

    /// Drain `reached` with the CPA algorithm using block-modular successors
    pub fn run(&mut self, reached: &mut NestedSet<D>) -> EngineResult<RunOutcome> {
        let outcome = self.run_cpa(reached);
        match &outcome {
            Ok(result) => info!(
                worker = %self.worker,
                states = reached.len(),
                target = ?result.target(),
                descents = self.statistics.descents,
                "block analysis finished"
            ),
            Err(err) if err.is_cancellation() => {
                info!(worker = %self.worker, "block analysis cancelled: {}", err)
            }
            Err(err) => warn!(worker = %self.worker, "block analysis failed: {}", err),
        }
        outcome
    }

    /// One algorithm step on `reached`
    pub fn step(&mut self, reached: &mut NestedSet<D>) -> StepOutcome {
        let algorithm = CpaAlgorithm::from_config(&self.config, self.shutdown.clone());
        algorithm.step(self, reached)
    }

    fn run_cpa(&mut self, reached: &mut NestedSet<D>) -> EngineResult<RunOutcome> {
        let algorithm = CpaAlgorithm::from_config(&self.config, self.shutdown.clone());
        algorithm.run(self, reached)
    }

    /// Rebuild the path from the root of `reached` to `target` through every
    /// cached block it crosses
    pub fn counterexample(
        &self,
        reached: &NestedSet<D>,
        target: NodeId,
    ) -> EngineResult<CounterexamplePath<D::State>> {
        CounterexampleReconstructor::new(&self.cache, self.config.max_recursion_depth)
            .reconstruct(reached, target)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Successors
    // ═══════════════════════════════════════════════════════════════════════

    /// Successors of the reached node `node`
    pub fn abstract_successors(
        &mut self,
        reached: &NestedSet<D>,
        node: NodeId,
    ) -> EngineResult<Successors<D>> {
        let arg_node = reached.node(node).ok_or(EngineError::UnknownNode(node.0))?;
        let precision = reached
            .precision(node)
            .cloned()
            .ok_or(EngineError::UnknownNode(node.0))?;
        let state = arg_node.state().clone();
        let location = state.location();
        let partitioning = Arc::clone(&self.partitioning);
        let current = self
            .stack
            .last()
            .and_then(|frame| partitioning.block(frame.block));

        if let Some(block) = current {
            if block.is_exit(location) && !arg_node.is_expanded_from(block.id) {
                return Ok(Vec::new());
            }
        }

        if let Some(block) = partitioning.block_for_entry(location) {
            let is_root = reached.root() == Some(node);
            let reentering =
                current.map(|b| b.id) == Some(block.id) && !arg_node.entered_by_call(&self.cfa);
            if !is_root && !reentering {
                return self.descend(&state, &precision, block);
            }
        }

        let mut successors = Vec::new();
        for edge in self.cfa.outgoing(location) {
            for succ in self.domain.successors(&state, &precision, edge)? {
                successors.push(AbstractSuccessor {
                    state: succ,
                    precision: precision.clone(),
                    edge: ArgEdge::Cfa(edge.id),
                });
            }
        }
        Ok(successors)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Nested analyses
    // ═══════════════════════════════════════════════════════════════════════

    fn descend(
        &mut self,
        state: &D::State,
        precision: &D::Precision,
        block: &Block,
    ) -> EngineResult<Successors<D>> {
        self.shutdown.check()?;
        let depth = self.stack.len() + 1;
        if depth > self.config.max_recursion_depth {
            return Err(EngineError::RecursionDepthExceeded {
                depth,
                max_depth: self.config.max_recursion_depth,
            }
            .wrap_recursive(depth, &block.name));
        }

        let recursive = self.stack.iter().any(|frame| frame.block == block.id);
        if recursive {
            self.statistics.recursive_descents += 1;
            self.domain.enter_recursion(block);
        }
        let result = self.descend_into(state, precision, block, depth);
        if recursive {
            self.domain.leave_recursion(block);
        }

        let successors = result.map_err(|err| err.wrap_recursive(depth, &block.name))?;
        self.shutdown.check()?;
        Ok(successors)
    }

    fn descend_into(
        &mut self,
        state: &D::State,
        precision: &D::Precision,
        block: &Block,
        depth: usize,
    ) -> EngineResult<Successors<D>> {
        let key = CacheKey::new(
            self.domain.reduce_state(state, block, state.location()),
            self.domain.reduce_precision(precision, block),
            block.id,
        );
        self.statistics.descents += 1;

        if let Some(owner) = self.stack.iter().rposition(|frame| frame.key == key) {
            let exits = self.approximate(owner);
            return Ok(self.expand_exits(state, precision, block, &key, exits, None));
        }

        let nested = if self.config.caches_block(&block.name) {
            match self.cache.lookup(&key, self.worker) {
                CacheLookup::FullHit {
                    entry,
                    exits,
                    provisional_on,
                } => {
                    self.inherit_provisional(&provisional_on);
                    self.record_use(entry);
                    return Ok(self.expand_exits(state, precision, block, &key, exits, None));
                }
                CacheLookup::PartialHit { entry, reached } | CacheLookup::Miss { entry, reached } => {
                    (Some(entry), reached)
                }
                CacheLookup::Busy => {
                    self.statistics.private_analyses += 1;
                    (None, self.cache.private_set(&key))
                }
            }
        } else {
            self.statistics.private_analyses += 1;
            (None, self.cache.private_set(&key))
        };

        let (entry, reached) = nested;
        let (private, exits) = self.run_nested(key.clone(), block, entry, reached, depth)?;
        if let Some(entry) = entry {
            self.record_use(entry);
        }
        Ok(self.expand_exits(state, precision, block, &key, exits, private.map(Arc::new)))
    }

    /// Run (or resume) a nested analysis to its fixpoint
    ///
    /// Returns the nested set back to the caller when it is not cached.
    fn run_nested(
        &mut self,
        key: CacheKey<D::State, D::Precision>,
        block: &Block,
        entry: Option<EntryId>,
        mut reached: NestedSet<D>,
        depth: usize,
    ) -> EngineResult<(Option<NestedSet<D>>, Exits<D>)> {
        self.stack.push(CallFrame::new(key.clone(), block.id, entry));
        self.statistics.max_depth = self.statistics.max_depth.max(depth);
        debug!(block = %block, depth, entry = ?entry, worker = %self.worker, "entering block");

        let mut restarts = 0;
        let result = loop {
            let outcome = match self.run_cpa(&mut reached) {
                Ok(outcome) => outcome,
                Err(err) => break Err(err),
            };
            let exits = collect_exits(&reached, block, outcome);
            // A target reached under an under-approximation is a real violation
            if outcome.target().is_some() {
                break Ok(exits);
            }

            let Some(frame) = self.stack.last_mut() else {
                break Ok(exits);
            };
            if !frame.approximation_used || frame.is_stable(&exits) {
                break Ok(exits);
            }

            restarts += 1;
            self.statistics.fixpoint_restarts += 1;
            if restarts >= self.config.max_fixpoint_iterations {
                break Err(EngineError::FixpointNotConverged {
                    block: block.name.clone(),
                    iterations: restarts,
                });
            }
            debug!(block = %block, restarts, exits = exits.len(), "recursion approximation grew");
            frame.approximation = exits;
            frame.approximation_used = false;
            if let Some(entry) = entry {
                self.cache.invalidate_provisional_on(entry);
            }
            reached = self.cache.private_set(&key);
        };

        let frame = self.stack.pop();
        debug!(block = %block, depth, ok = result.is_ok(), "leaving block");

        let Some(entry) = entry else {
            return result.map(|exits| (Some(reached), exits));
        };
        // Entries derived from this frame's approximations are final now
        self.cache.clear_provisional(entry);

        match result {
            Ok(exits) => {
                let outcome = match &frame {
                    Some(frame) if frame.depends_on_private => CheckIn::Discard,
                    Some(frame) => CheckIn::Complete {
                        exits: exits.clone(),
                        provisional_on: frame.provisional_on.clone(),
                    },
                    None => CheckIn::Discard,
                };
                self.cache.check_in(entry, self.worker, reached, outcome)?;
                Ok((None, exits))
            }
            Err(err) => {
                self.cache.invalidate_provisional_on(entry);
                let outcome = match &frame {
                    Some(frame) if !frame.is_provisional() => CheckIn::Incomplete,
                    _ => CheckIn::Discard,
                };
                if let Err(check_in) = self.cache.check_in(entry, self.worker, reached, outcome) {
                    warn!(entry = %entry, "check-in after failed analysis: {}", check_in);
                }
                Err(err)
            }
        }
    }

    /// Answer a recursive call from the approximation of frame `owner`
    fn approximate(&mut self, owner: usize) -> Exits<D> {
        self.statistics.approximated_calls += 1;
        let Some(frame) = self.stack.get_mut(owner) else {
            return Vec::new();
        };
        frame.approximation_used = true;
        let exits = frame.approximation.clone();
        let owner_entry = frame.entry;
        for deeper in self.stack.iter_mut().skip(owner + 1) {
            match owner_entry {
                Some(entry) => {
                    deeper.provisional_on.insert(entry);
                }
                None => deeper.depends_on_private = true,
            }
        }
        exits
    }

    /// A full hit on a provisional entry makes every frame above the owner
    /// of each mark provisional too
    fn inherit_provisional(&mut self, marks: &BTreeSet<EntryId>) {
        for mark in marks {
            let first = self
                .stack
                .iter()
                .position(|frame| frame.entry == Some(*mark))
                .map_or(0, |owner| owner + 1);
            for frame in self.stack.iter_mut().skip(first) {
                frame.provisional_on.insert(*mark);
            }
        }
    }

    /// The analysis on top of the stack consumed the exits of `used`
    fn record_use(&self, used: EntryId) {
        if let Some(user) = self.stack.last().and_then(|frame| frame.entry) {
            self.cache.record_dependency(used, user);
        }
    }

    fn expand_exits(
        &mut self,
        root: &D::State,
        precision: &D::Precision,
        block: &Block,
        key: &CacheKey<D::State, D::Precision>,
        exits: Exits<D>,
        private: Option<Arc<NestedSet<D>>>,
    ) -> Successors<D> {
        let mut successors = Vec::with_capacity(exits.len());
        for exit in exits {
            let Some(expanded) = self.domain.expand_state(root, block, &exit.state) else {
                self.statistics.infeasible_expansions += 1;
                continue;
            };
            let expanded_precision = self.domain.expand_precision(precision, block, &exit.precision);
            let record = ExpansionRecord {
                key: key.clone(),
                reduced_exit: exit.state,
                private: private.clone(),
            };
            successors.push(AbstractSuccessor {
                state: expanded,
                precision: expanded_precision,
                edge: ArgEdge::Summary(Arc::new(record)),
            });
        }
        successors
    }
}

impl<D: Reducer> TransferRelation for BlockAnalysis<D> {
    type Domain = D;

    fn domain(&self) -> &D {
        &self.domain
    }

    fn successors(
        &mut self,
        reached: &NestedSet<D>,
        node: NodeId,
    ) -> EngineResult<Successors<D>> {
        self.abstract_successors(reached, node)
    }
}

/// Exit states of a finished (or early-stopped) nested analysis
///
/// A run that stopped on a target reports that single target. Otherwise the
/// exits are the reached states at the block's exit locations, except those
/// lifted out of a recursive summary of the same block, plus every target.
fn collect_exits<S, P>(reached: &ArgReachedSet<S, P>, block: &Block, outcome: RunOutcome) -> Vec<ExitState<S, P>>
where
    S: AbstractState,
    P: crate::shared::ports::AbstractPrecision,
{
    let exit_state = |id: NodeId| -> Option<ExitState<S, P>> {
        Some(ExitState {
            node: id,
            state: reached.state(id)?.clone(),
            precision: reached.precision(id)?.clone(),
        })
    };

    if let Some(target) = outcome.target() {
        return exit_state(target).into_iter().collect();
    }

    reached
        .nodes()
        .filter(|id| {
            let Some(node) = reached.node(*id) else {
                return false;
            };
            let state = node.state();
            state.is_target()
                || (block.is_exit(state.location()) && !node.is_expanded_from(block.id))
        })
        .filter_map(exit_state)
        .collect()
}
