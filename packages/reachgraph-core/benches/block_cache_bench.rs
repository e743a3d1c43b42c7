//! Benchmark for block-summary reuse
//!
//! Measures:
//! - Outer analysis of `main` calling one helper many times, summaries cached
//! - The same analysis with every descent re-analyzed
//! - Cache lookup cost on a warm cache

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reachgraph_core::{
    AbstractDomain, AbstractState, Block, BlockAnalysis, BlockPartitioning, BlockSummaryCache,
    CachePolicy, Cfa, CfaEdge, DomainResult, EdgeKind, EngineConfig, LocationId, Reducer,
    ShutdownNotifier,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CallState {
    loc: LocationId,
    stack: Vec<LocationId>,
    calls: u32,
}

impl AbstractState for CallState {
    fn location(&self) -> LocationId {
        self.loc
    }
}

/// Counts calls in `main`; the count is invisible inside the helper
struct CallCounter;

impl AbstractDomain for CallCounter {
    type State = CallState;
    type Precision = ();

    fn initial_state(&self, entry: LocationId) -> CallState {
        CallState {
            loc: entry,
            stack: Vec::new(),
            calls: 0,
        }
    }

    fn initial_precision(&self, _entry: LocationId) {}

    fn successors(&self, state: &CallState, _precision: &(), edge: &CfaEdge) -> DomainResult<Vec<CallState>> {
        let mut next = state.clone();
        next.loc = edge.to;
        match edge.kind {
            EdgeKind::FunctionCall { return_site } => {
                next.stack.push(return_site);
                next.calls += 1;
            }
            EdgeKind::FunctionReturn => {
                if next.stack.pop() != Some(edge.to) {
                    return Ok(Vec::new());
                }
            }
            _ => {}
        }
        Ok(vec![next])
    }
}

impl Reducer for CallCounter {
    fn reduce_state(&self, _state: &CallState, _block: &Block, entry: LocationId) -> CallState {
        self.initial_state(entry)
    }

    fn reduce_precision(&self, _precision: &(), _block: &Block) {}

    fn expand_state(&self, root: &CallState, _block: &Block, reduced_exit: &CallState) -> Option<CallState> {
        Some(CallState {
            loc: reduced_exit.loc,
            stack: root.stack.clone(),
            calls: root.calls,
        })
    }
}

/// `main` calls `helper` `calls` times; `helper` is a chain of `body` edges
fn generate_program(calls: u32, body: u32) -> (Arc<Cfa>, Arc<BlockPartitioning>) {
    let mut cfa = Cfa::new();
    let helper_entry = cfa.new_location();
    let mut loc = helper_entry;
    for _ in 0..body {
        let next = cfa.new_location();
        cfa.add_edge(loc, next, EdgeKind::Blank, "", &[]);
        loc = next;
    }
    let helper_exit = loc;

    let main_entry = cfa.new_location();
    let mut site = main_entry;
    for _ in 0..calls {
        let return_site = cfa.new_location();
        cfa.add_edge(site, helper_entry, EdgeKind::FunctionCall { return_site }, "call", &[]);
        cfa.add_edge(helper_exit, return_site, EdgeKind::FunctionReturn, "return", &[]);
        site = return_site;
    }

    cfa.add_function("helper", helper_entry, helper_exit);
    cfa.add_function("main", main_entry, site);
    cfa.set_main("main");
    let partitioning = BlockPartitioning::builder(&cfa)
        .with_functions()
        .build()
        .unwrap();
    (Arc::new(cfa), Arc::new(partitioning))
}

fn analyze(cfa: &Arc<Cfa>, partitioning: &Arc<BlockPartitioning>, config: &EngineConfig) -> usize {
    let cache = Arc::new(BlockSummaryCache::from_config(config));
    let mut driver = BlockAnalysis::new(
        Arc::new(CallCounter),
        Arc::clone(cfa),
        Arc::clone(partitioning),
        cache,
        config.clone(),
        ShutdownNotifier::new(),
    )
    .unwrap();
    let mut reached = driver.initial_reached_set().unwrap();
    driver.run(&mut reached).unwrap();
    reached.len()
}

/// Benchmark outer analysis with and without summary reuse
fn bench_summary_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("summary_reuse");

    for calls in [8u32, 32, 128].iter() {
        let (cfa, partitioning) = generate_program(*calls, 16);

        let cached = EngineConfig::default();
        group.bench_with_input(BenchmarkId::new("cached", calls), calls, |b, _| {
            b.iter(|| black_box(analyze(&cfa, &partitioning, &cached)))
        });

        let uncached = EngineConfig::default().cache_policy(CachePolicy::Never);
        group.bench_with_input(BenchmarkId::new("uncached", calls), calls, |b, _| {
            b.iter(|| black_box(analyze(&cfa, &partitioning, &uncached)))
        });
    }

    group.finish();
}

/// Benchmark a warm cache: the helper is analyzed once, then every run hits
fn bench_warm_cache(c: &mut Criterion) {
    let (cfa, partitioning) = generate_program(64, 16);
    let config = EngineConfig::default();
    let cache = Arc::new(BlockSummaryCache::from_config(&config));
    let mut warmup = BlockAnalysis::new(
        Arc::new(CallCounter),
        Arc::clone(&cfa),
        Arc::clone(&partitioning),
        Arc::clone(&cache),
        config.clone(),
        ShutdownNotifier::new(),
    )
    .unwrap();
    let mut reached = warmup.initial_reached_set().unwrap();
    warmup.run(&mut reached).unwrap();

    c.bench_function("warm_cache_64_calls", |b| {
        b.iter(|| {
            let mut driver = BlockAnalysis::new(
                Arc::new(CallCounter),
                Arc::clone(&cfa),
                Arc::clone(&partitioning),
                Arc::clone(&cache),
                config.clone(),
                ShutdownNotifier::new(),
            )
            .unwrap();
            let mut reached = driver.initial_reached_set().unwrap();
            driver.run(&mut reached).unwrap();
            black_box(reached.len())
        })
    });
}

criterion_group!(benches, bench_summary_reuse, bench_warm_cache);
criterion_main!(benches);
