//! Property: block-modular results equal full unfolding
//!
//! `main` sets `x` and `y`, calls `f`, bumps `y` and calls `f` again. `f`
//! only touches `x`, so both calls may share one summary. The states at the
//! end of `main` must not depend on whether `f` was summarized.
//!
//! The recursive layout has `f` add `k` to `x` and call itself while
//! `x < c`. `x` stays tracked there so the unfolded run terminates.

mod common;

use common::*;
use proptest::prelude::*;
use reachgraph_core::{
    ArgReachedSet, CpaAlgorithm, EngineConfig, PlainTransfer, Preset, ShutdownNotifier,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn program(a: i64, b: i64, k: i64, c: i64) -> Program {
    ProgramBuilder::new()
        .stmt("m0", "m1", &format!("x = {}", a))
        .stmt("m1", "m2", &format!("y = {}", b))
        .call("m2", "f0", "m3")
        .stmt("m3", "m4", "y = y + 1")
        .call("m4", "f0", "m5")
        .stmt("f0", "f1", &format!("x = x + {}", k))
        .assume("f1", "f2", &format!("x < {}", c))
        .stmt("f2", "f3", "x = x + 1")
        .assume("f1", "f3", &format!("x >= {}", c))
        .ret("f3", "m3")
        .ret("f3", "m5")
        .function("main", "m0", "m5")
        .function("f", "f0", "f3")
        .main("main")
        .build()
}

fn recursive_program(a: i64, b: i64, k: i64, c: i64) -> Program {
    ProgramBuilder::new()
        .stmt("m0", "m1", &format!("x = {}", a))
        .stmt("m1", "m2", &format!("y = {}", b))
        .call("m2", "f0", "m5")
        .stmt("f0", "f1", &format!("x = x + {}", k))
        .assume("f1", "f4", &format!("x < {}", c))
        .call("f4", "f0", "f2")
        .assume("f1", "f3", &format!("x >= {}", c))
        .blank("f2", "f3")
        .ret("f3", "m5")
        .ret("f3", "f2")
        .function("main", "m0", "m5")
        .function("f", "f0", "f3")
        .main("main")
        .build()
}

fn modular(program: &Program, domain: Arc<ValueDomain>) -> BTreeSet<ValueState> {
    let config = EngineConfig::from_preset(Preset::Thorough);
    let mut driver = program.driver(domain, config);
    let mut reached = driver.initial_reached_set().unwrap();
    driver.run(&mut reached).unwrap();
    states_at(&reached, program.loc("m5")).into_iter().collect()
}

fn unfolded(program: &Program, domain: Arc<ValueDomain>, precision: Tracked) -> BTreeSet<ValueState> {
    let entry = program.loc("m0");
    let config = EngineConfig::from_preset(Preset::Thorough);
    let mut reached = ArgReachedSet::with_root(
        config.waitlist_order,
        config.partitioning,
        ValueState::at(entry),
        precision,
    );
    let mut plain = PlainTransfer::new(domain, Arc::clone(&program.cfa));
    CpaAlgorithm::new(false, ShutdownNotifier::new())
        .run(&mut plain, &mut reached)
        .unwrap();
    states_at(&reached, program.loc("m5")).into_iter().collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn summaries_match_unfolding(
        a in -3i64..3,
        b in -3i64..3,
        k in 0i64..3,
        c in -2i64..6,
        track_x in any::<bool>(),
        track_y in any::<bool>(),
    ) {
        let mut names = Vec::new();
        if track_x {
            names.push("x");
        }
        if track_y {
            names.push("y");
        }
        let precision = tracked(&names);
        let program = program(a, b, k, c);
        let domain = Arc::new(ValueDomain::new(precision.clone()));

        let via_cache = modular(&program, Arc::clone(&domain));
        let inline = unfolded(&program, domain, precision);
        prop_assert!(!inline.is_empty());
        prop_assert_eq!(via_cache, inline);
    }

    #[test]
    fn recursive_summaries_match_unfolding(
        a in -3i64..3,
        b in -3i64..3,
        k in 1i64..3,
        c in -2i64..6,
        track_y in any::<bool>(),
    ) {
        let precision = if track_y { tracked(&["x", "y"]) } else { tracked(&["x"]) };
        let program = recursive_program(a, b, k, c);
        let domain = Arc::new(ValueDomain::new(precision.clone()));

        let via_cache = modular(&program, Arc::clone(&domain));
        let inline = unfolded(&program, domain, precision);
        prop_assert_eq!(inline.len(), 1);
        prop_assert_eq!(via_cache, inline);
    }
}
