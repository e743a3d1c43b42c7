//! Rayon-backed task runner

use crate::config::EngineConfig;
use crate::errors::EngineResult;
use crate::features::arg::ArgReachedSet;
use crate::features::block_cache::{BlockSummaryCache, WorkerId};
use crate::features::block_transfer::{BlockAnalysis, DriverStatistics};
use crate::features::cpa_algorithm::{RunOutcome, StepOutcome};
use crate::features::reached_set::ConcurrentReachedSet;
use crate::shared::models::{BlockPartitioning, Cfa, LocationId};
use crate::shared::ports::{AbstractState, Reducer};
use crate::shared::shutdown::ShutdownNotifier;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::{info, warn};

/// One independent analysis
#[derive(Debug, Clone)]
pub struct AnalysisTask<S, P> {
    pub name: String,
    pub state: S,
    pub precision: P,
}

impl<S, P> AnalysisTask<S, P> {
    pub fn new(name: impl Into<String>, state: S, precision: P) -> Self {
        Self {
            name: name.into(),
            state,
            precision,
        }
    }
}

/// Outcome of one task with the reached set it produced
#[derive(Debug)]
pub struct TaskResult<S: AbstractState, P> {
    pub name: String,
    pub worker: WorkerId,
    pub outcome: EngineResult<RunOutcome>,
    pub reached: ArgReachedSet<S, P>,
    pub statistics: DriverStatistics,
}

impl<S: AbstractState, P> TaskResult<S, P> {
    pub fn target(&self) -> Option<crate::features::arg::NodeId> {
        self.outcome.as_ref().ok().and_then(RunOutcome::target)
    }
}

/// Runs analysis tasks concurrently over one shared summary cache
pub struct ParallelAnalysis<D: Reducer> {
    domain: Arc<D>,
    cfa: Arc<Cfa>,
    partitioning: Arc<BlockPartitioning>,
    cache: Arc<BlockSummaryCache<D::State, D::Precision>>,
    config: EngineConfig,
    shutdown: ShutdownNotifier,
    pool: ThreadPool,
}

impl<D: Reducer> ParallelAnalysis<D> {
    pub fn new(
        domain: Arc<D>,
        cfa: Arc<Cfa>,
        partitioning: Arc<BlockPartitioning>,
        cache: Arc<BlockSummaryCache<D::State, D::Precision>>,
        config: EngineConfig,
        shutdown: ShutdownNotifier,
    ) -> EngineResult<Self> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.effective_worker_threads())
            .thread_name(|i| format!("reachgraph-worker-{}", i))
            .build()?;
        Ok(Self {
            domain,
            cfa,
            partitioning,
            cache,
            config,
            shutdown,
            pool,
        })
    }

    pub fn cache(&self) -> &Arc<BlockSummaryCache<D::State, D::Precision>> {
        &self.cache
    }

    pub fn shutdown(&self) -> &ShutdownNotifier {
        &self.shutdown
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Task seeded with the domain's initial state at `entry`
    pub fn task_at(&self, name: impl Into<String>, entry: LocationId) -> AnalysisTask<D::State, D::Precision> {
        AnalysisTask::new(
            name,
            self.domain.initial_state(entry),
            self.domain.initial_precision(entry),
        )
    }

    /// Run every task to completion; results keep the order of `tasks`
    pub fn run(
        &self,
        tasks: Vec<AnalysisTask<D::State, D::Precision>>,
    ) -> Vec<TaskResult<D::State, D::Precision>> {
        info!(tasks = tasks.len(), threads = self.num_threads(), "starting parallel analysis");
        self.pool.install(|| {
            tasks
                .into_par_iter()
                .enumerate()
                .map(|(i, task)| self.run_task(WorkerId(i as u32 + 1), task))
                .collect()
        })
    }

    fn run_task(
        &self,
        worker: WorkerId,
        task: AnalysisTask<D::State, D::Precision>,
    ) -> TaskResult<D::State, D::Precision> {
        let AnalysisTask {
            name,
            state,
            precision,
        } = task;
        let reached = ArgReachedSet::with_root(
            self.config.waitlist_order,
            self.config.partitioning,
            state,
            precision,
        );

        let driver = BlockAnalysis::new(
            Arc::clone(&self.domain),
            Arc::clone(&self.cfa),
            Arc::clone(&self.partitioning),
            Arc::clone(&self.cache),
            self.config.clone(),
            self.shutdown.clone(),
        );
        let mut driver = match driver {
            Ok(driver) => driver.with_worker(worker),
            Err(err) => {
                return TaskResult {
                    name,
                    worker,
                    outcome: Err(err),
                    reached,
                    statistics: DriverStatistics::default(),
                }
            }
        };

        let shared = ConcurrentReachedSet::new(reached);
        let outcome = loop {
            if !shared.has_waiting_state() {
                break Ok(RunOutcome::Exhausted);
            }
            match shared.write(|r| driver.step(r)) {
                StepOutcome::Continue => {}
                StepOutcome::BreakEarly(reason) => break Ok(RunOutcome::BreakEarly(reason)),
                StepOutcome::Fail(err) => break Err(err),
            }
        };

        match &outcome {
            Ok(result) => info!(task = %name, %worker, target = ?result.target(), "task finished"),
            Err(err) => warn!(task = %name, %worker, "task failed: {}", err),
        }

        let reached = shared.into_inner().unwrap_or_else(|handle| handle.snapshot());
        TaskResult {
            name,
            worker,
            outcome,
            reached,
            statistics: driver.statistics().clone(),
        }
    }
}
