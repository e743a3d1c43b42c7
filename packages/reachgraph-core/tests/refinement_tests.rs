//! Subtree removal in the outer set and inside cached blocks

mod common;

use common::*;
use pretty_assertions::assert_eq;
use reachgraph_core::features::block_cache::CacheKey;
use reachgraph_core::{
    remove_subtree, remove_subtree_in_block, CacheClass, EngineConfig, EngineError, EntryId,
    LocationId, RunOutcome, ShutdownNotifier,
};
use std::sync::Arc;

fn analyzed_two_calls() -> (Program, Arc<ValueDomain>, Arc<ValueCache>, ValueReachedSet) {
    let program = two_calls();
    let domain = Arc::new(ValueDomain::new(tracked(&["x", "y", "z"])));
    let config = EngineConfig::default();
    let cache = Arc::new(ValueCache::from_config(&config));
    let mut driver = program.driver_with(
        Arc::clone(&domain),
        Arc::clone(&cache),
        config,
        ShutdownNotifier::new(),
    );
    let mut reached = driver.initial_reached_set().unwrap();
    driver.run(&mut reached).unwrap();
    (program, domain, cache, reached)
}

fn only_key(cache: &ValueCache) -> CacheKey<ValueState, Tracked> {
    cache.key_of(EntryId(0)).expect("first entry")
}

#[test]
fn test_outer_removal_is_complete_and_rerun_restores_result() {
    let (program, domain, cache, mut reached) = analyzed_two_calls();
    let final_states = states_at(&reached, program.loc("m4"));

    let m1 = reached
        .nodes()
        .find(|id| reached.state(*id).unwrap().loc == program.loc("m1"))
        .unwrap();
    let before = reached.arg().descendants(m1);
    assert!(!before.is_empty());

    let removed = remove_subtree(&mut reached, m1, None).unwrap();
    assert_eq!(removed.removed_count(), before.len());
    for id in before {
        assert!(!reached.arg().contains(id));
    }
    assert!(reached.is_reached(m1));
    assert!(reached.is_waiting(m1));
    assert!(states_at(&reached, program.loc("m4")).is_empty());

    let mut driver = program.driver_with(domain, Arc::clone(&cache), EngineConfig::default(), ShutdownNotifier::new());
    assert_eq!(driver.run(&mut reached).unwrap(), RunOutcome::Exhausted);
    assert_eq!(states_at(&reached, program.loc("m4")), final_states);
    // Both calls are answered from the cache this time
    assert_eq!(cache.statistics().full_hits, 3);
}

#[test]
fn test_new_precision_is_applied() {
    let (program, _, _, mut reached) = analyzed_two_calls();
    let m2 = reached
        .nodes()
        .find(|id| reached.state(*id).unwrap().loc == program.loc("m2"))
        .unwrap();
    remove_subtree(&mut reached, m2, Some(tracked(&["x"]))).unwrap();
    assert_eq!(reached.precision(m2), Some(&tracked(&["x"])));
}

#[test]
fn test_removal_inside_block_turns_entry_into_partial_hit() {
    let (program, domain, cache, _) = analyzed_two_calls();
    let key = only_key(&cache);
    let nested_root = cache
        .with_nested_set(&key, |set, _| set.root().unwrap())
        .unwrap();

    let (removed, invalidated) = remove_subtree_in_block(&cache, &key, nested_root, None).unwrap();
    assert_eq!(removed.removed_count(), 1);
    assert!(invalidated.is_empty());
    assert_eq!(cache.get(&key), CacheClass::PartialHit);
    assert!(cache.exit_states(&key).is_none());

    let mut driver = program.driver_with(domain, Arc::clone(&cache), EngineConfig::default(), ShutdownNotifier::new());
    let mut reached = driver.initial_reached_set().unwrap();
    driver.run(&mut reached).unwrap();

    let stats = cache.statistics();
    assert_eq!(stats.partial_hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(cache.get(&key), CacheClass::FullHit);
    assert_eq!(states_at(&reached, program.loc("m4")).len(), 1);
}

#[test]
fn test_removal_inside_block_rejects_bad_input() {
    let (program, _, cache, _) = analyzed_two_calls();
    let key = only_key(&cache);

    let err = remove_subtree_in_block(&cache, &key, reachgraph_core::NodeId(42), None).unwrap_err();
    assert!(matches!(err, EngineError::UnknownNode(42)));
    assert_eq!(cache.get(&key), CacheClass::FullHit);

    let missing = CacheKey::new(ValueState::at(LocationId(999)), Tracked::new(), program.block("f").id);
    let err = remove_subtree_in_block(&cache, &missing, reachgraph_core::NodeId(0), None).unwrap_err();
    assert!(matches!(err, EngineError::MissingBlockSummary { .. }));
}
