//! Program builders and analysis fixtures

use super::domain::{ValueDomain, ValueState};
use reachgraph_core::features::block_cache::BlockSummaryCache;
use reachgraph_core::shared::models::PartitioningBuilder;
use reachgraph_core::{
    ArgReachedSet, Block, BlockAnalysis, BlockPartitioning, Cfa, EdgeKind, EngineConfig,
    LocationId, ShutdownNotifier,
};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type ValueCache = BlockSummaryCache<ValueState, super::domain::Tracked>;
pub type ValueReachedSet = ArgReachedSet<ValueState, super::domain::Tracked>;

const KEYWORDS: [&str; 2] = ["error", "tick"];

/// Builds a CFA from named locations
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    cfa: Cfa,
    locs: BTreeMap<String, LocationId>,
    functions: Vec<(String, String, String)>,
    main: Option<String>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn loc(&mut self, name: &str) -> LocationId {
        if let Some(loc) = self.locs.get(name) {
            return *loc;
        }
        let loc = self.cfa.new_location();
        self.locs.insert(name.to_string(), loc);
        loc
    }

    fn edge(mut self, from: &str, to: &str, kind: EdgeKind, label: &str) -> Self {
        let from = self.loc(from);
        let to = self.loc(to);
        let variables: Vec<&str> = label
            .split_whitespace()
            .filter(|t| t.starts_with(|c: char| c.is_ascii_alphabetic()))
            .filter(|t| !KEYWORDS.contains(t))
            .collect();
        let variables = if matches!(kind, EdgeKind::Statement | EdgeKind::Assume) {
            variables
        } else {
            Vec::new()
        };
        self.cfa.add_edge(from, to, kind, label, &variables);
        self
    }

    pub fn stmt(self, from: &str, to: &str, label: &str) -> Self {
        self.edge(from, to, EdgeKind::Statement, label)
    }

    pub fn assume(self, from: &str, to: &str, condition: &str) -> Self {
        self.edge(from, to, EdgeKind::Assume, condition)
    }

    pub fn blank(self, from: &str, to: &str) -> Self {
        self.edge(from, to, EdgeKind::Blank, "")
    }

    pub fn call(mut self, from: &str, entry: &str, return_site: &str) -> Self {
        let return_site = self.loc(return_site);
        self.edge(from, entry, EdgeKind::FunctionCall { return_site }, "call")
    }

    pub fn ret(self, exit: &str, return_site: &str) -> Self {
        self.edge(exit, return_site, EdgeKind::FunctionReturn, "return")
    }

    pub fn function(mut self, name: &str, entry: &str, exit: &str) -> Self {
        self.functions
            .push((name.to_string(), entry.to_string(), exit.to_string()));
        self
    }

    pub fn main(mut self, name: &str) -> Self {
        self.main = Some(name.to_string());
        self
    }

    /// One block per function
    pub fn build(self) -> Program {
        self.build_with(|b| b.with_functions())
    }

    pub fn build_with(
        mut self,
        partition: impl FnOnce(PartitioningBuilder<'_>) -> PartitioningBuilder<'_>,
    ) -> Program {
        let functions = std::mem::take(&mut self.functions);
        for (name, entry, exit) in functions {
            let entry = self.loc(&entry);
            let exit = self.loc(&exit);
            self.cfa.add_function(name, entry, exit);
        }
        if let Some(main) = &self.main {
            assert!(self.cfa.set_main(main), "unknown main function {}", main);
        }
        let partitioning = partition(BlockPartitioning::builder(&self.cfa))
            .build()
            .expect("valid partitioning");
        Program {
            cfa: Arc::new(self.cfa),
            partitioning: Arc::new(partitioning),
            locs: self.locs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Program {
    pub cfa: Arc<Cfa>,
    pub partitioning: Arc<BlockPartitioning>,
    pub locs: BTreeMap<String, LocationId>,
}

impl Program {
    pub fn loc(&self, name: &str) -> LocationId {
        self.locs[name]
    }

    pub fn block(&self, name: &str) -> &Block {
        self.partitioning
            .block_by_name(name)
            .unwrap_or_else(|| panic!("no block {}", name))
    }

    /// Driver with a fresh cache
    pub fn driver(&self, domain: Arc<ValueDomain>, config: EngineConfig) -> BlockAnalysis<ValueDomain> {
        self.driver_with(domain, Arc::new(ValueCache::from_config(&config)), config, ShutdownNotifier::new())
    }

    pub fn driver_with(
        &self,
        domain: Arc<ValueDomain>,
        cache: Arc<ValueCache>,
        config: EngineConfig,
        shutdown: ShutdownNotifier,
    ) -> BlockAnalysis<ValueDomain> {
        BlockAnalysis::new(
            domain,
            Arc::clone(&self.cfa),
            Arc::clone(&self.partitioning),
            cache,
            config,
            shutdown,
        )
        .expect("valid driver")
    }
}

/// Reached states at `loc`
pub fn states_at(reached: &ValueReachedSet, loc: LocationId) -> Vec<ValueState> {
    reached
        .reached()
        .states()
        .filter(|s| s.loc == loc)
        .cloned()
        .collect()
}

/// `main` calls `f` twice with the same `x` and `z`; `f` computes `z` from `x`
///
/// `main` resets `z` before each call, so both entries reduce to one key.
pub fn two_calls() -> Program {
    ProgramBuilder::new()
        .stmt("m0", "m0z", "x = 1")
        .stmt("m0z", "m1", "z = 0")
        .call("m1", "f0", "m2")
        .stmt("m2", "m2z", "y = 2")
        .stmt("m2z", "m3", "z = 0")
        .call("m3", "f0", "m4")
        .stmt("f0", "f1", "z = x + 1")
        .ret("f1", "m2")
        .ret("f1", "m4")
        .function("main", "m0", "m4")
        .function("f", "f0", "f1")
        .main("main")
        .build()
}

/// Violation reachable only inside `f`, five edges from the program entry
pub fn error_in_callee() -> Program {
    ProgramBuilder::new()
        .stmt("m0", "m1", "x = 1")
        .call("m1", "f0", "m2")
        .stmt("f0", "f1", "x = x + 1")
        .assume("f1", "f2", "x == 2")
        .stmt("f2", "f3", "error")
        .assume("f1", "f4", "x != 2")
        .ret("f4", "m2")
        .function("main", "m0", "m2")
        .function("f", "f0", "f4")
        .main("main")
        .build()
}

/// `main` calls `g`, `g` calls `f`, the violation sits in `f`
pub fn error_two_levels_down() -> Program {
    ProgramBuilder::new()
        .stmt("m0", "m1", "x = 1")
        .call("m1", "g0", "m2")
        .stmt("g0", "g1", "y = 0")
        .call("g1", "f0", "g2")
        .blank("g2", "g3")
        .ret("g3", "m2")
        .stmt("f0", "f1", "x = x + 1")
        .assume("f1", "f2", "x == 2")
        .stmt("f2", "f3", "error")
        .assume("f1", "f4", "x != 2")
        .ret("f4", "g2")
        .function("main", "m0", "m2")
        .function("g", "g0", "g3")
        .function("f", "f0", "f4")
        .main("main")
        .build()
}

/// `f` recurses while `x < 3`
pub fn recursive() -> Program {
    ProgramBuilder::new()
        .stmt("m0", "m1", "x = 0")
        .call("m1", "f0", "m2")
        .stmt("f0", "f1", "x = x + 1")
        .assume("f1", "f4", "x < 3")
        .call("f4", "f0", "f2")
        .assume("f1", "f3", "x >= 3")
        .blank("f2", "f3")
        .ret("f3", "m2")
        .ret("f3", "f2")
        .function("main", "m0", "m2")
        .function("f", "f0", "f3")
        .main("main")
        .build()
}

/// `f` interprets a `tick` edge the domain can be told to cancel on
pub fn ticking_callee() -> Program {
    ProgramBuilder::new()
        .call("m0", "f0", "m1")
        .stmt("f0", "f1", "x = 1")
        .stmt("f1", "f2", "tick")
        .ret("f2", "m1")
        .function("main", "m0", "m1")
        .function("f", "f0", "f2")
        .main("main")
        .build()
}

/// `f` calls itself unconditionally and reaches the violation on its other branch
///
/// The violation edge is added before the recursive call, so a DFS waitlist
/// answers the call from the empty recursion approximation first.
pub fn recursive_violation() -> Program {
    ProgramBuilder::new()
        .call("m0", "f0", "m1")
        .blank("f0", "f1")
        .blank("f1", "f6")
        .stmt("f6", "f5", "error")
        .call("f1", "f0", "f2")
        .blank("f2", "f3")
        .ret("f3", "m1")
        .ret("f3", "f2")
        .function("main", "m0", "m1")
        .function("f", "f0", "f3")
        .main("main")
        .build()
}

/// `main` calls `f` twice with different `y`; `f` counts `x` up to 3 in a loop
///
/// The loop references only `x`, so both runs of `f` reach the loop head
/// with one reduced key.
pub fn counting_loop() -> ProgramBuilder {
    ProgramBuilder::new()
        .stmt("m0", "m1", "x = 0")
        .stmt("m1", "m2", "y = 0")
        .call("m2", "f0", "m3")
        .stmt("m3", "m4", "x = 0")
        .call("m4", "f0", "m5")
        .stmt("f0", "f1", "y = y + 1")
        .assume("f1", "f2", "x < 3")
        .stmt("f2", "f1", "x = x + 1")
        .assume("f1", "f3", "x >= 3")
        .ret("f3", "m3")
        .ret("f3", "m5")
        .function("main", "m0", "m5")
        .function("f", "f0", "f3")
        .main("main")
}
