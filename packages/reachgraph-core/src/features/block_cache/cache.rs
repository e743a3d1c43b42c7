//! Block-summary cache with check-out/check-in of nested sets

use super::dependency_graph::DependencyGraph;
use super::error::{CacheError, CacheResult};
use super::metrics::BlockCacheMetrics;
use super::types::{
    CacheClass, CacheKey, CacheLookup, CacheStatistics, CheckIn, EntryId, ExitState, WorkerId,
};
use crate::config::{EngineConfig, PartitionStrategy, WaitlistOrder};
use crate::errors::{EngineError, EngineResult};
use crate::features::arg::ArgReachedSet;
use crate::shared::ports::{AbstractPrecision, AbstractState};
use ahash::AHashMap;
use parking_lot::Mutex;
use prometheus::Registry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

#[derive(Debug)]
struct CacheEntry<S: AbstractState, P> {
    key: CacheKey<S, P>,
    /// `None` while checked out
    reached: Option<ArgReachedSet<S, P>>,
    owner: Option<WorkerId>,
    exits: Option<Vec<ExitState<S, P>>>,
    provisional_on: BTreeSet<EntryId>,
    provisional_worker: Option<WorkerId>,
    /// Invalidated while checked out; dropped at check-in
    stale: bool,
    hits: u64,
}

impl<S: AbstractState, P: AbstractPrecision> CacheEntry<S, P> {
    fn is_checked_out(&self) -> bool {
        self.reached.is_none()
    }

    /// Exits usable without touching the nested set
    fn is_complete(&self) -> bool {
        match (&self.exits, &self.reached) {
            (Some(exits), Some(reached)) => {
                !reached.has_waiting_state() || is_violation_shortcut(exits)
            }
            _ => false,
        }
    }
}

fn is_violation_shortcut<S: AbstractState, P>(exits: &[ExitState<S, P>]) -> bool {
    exits.len() == 1 && exits[0].state.is_target()
}

#[derive(Debug)]
struct CacheState<S: AbstractState, P> {
    index: AHashMap<CacheKey<S, P>, EntryId>,
    entries: BTreeMap<EntryId, CacheEntry<S, P>>,
    dependencies: DependencyGraph,
    next_id: u64,
    full_hits: u64,
    partial_hits: u64,
    misses: u64,
    busy: u64,
    invalidations: u64,
}

impl<S: AbstractState, P> Default for CacheState<S, P> {
    fn default() -> Self {
        Self {
            index: AHashMap::new(),
            entries: BTreeMap::new(),
            dependencies: DependencyGraph::new(),
            next_id: 0,
            full_hits: 0,
            partial_hits: 0,
            misses: 0,
            busy: 0,
            invalidations: 0,
        }
    }
}

/// Memoized nested analyses shared by every descent (and every worker)
///
/// All bookkeeping sits behind one mutex; every public operation is a
/// single critical section.
#[derive(Debug)]
pub struct BlockSummaryCache<S: AbstractState, P> {
    order: WaitlistOrder,
    partitioning: PartitionStrategy,
    state: Mutex<CacheState<S, P>>,
    metrics: Option<BlockCacheMetrics>,
}

impl<S, P> BlockSummaryCache<S, P>
where
    S: AbstractState,
    P: AbstractPrecision,
{
    pub fn new(order: WaitlistOrder, partitioning: PartitionStrategy) -> Self {
        Self {
            order,
            partitioning,
            state: Mutex::new(CacheState::default()),
            metrics: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.waitlist_order, config.partitioning)
    }

    /// Register prometheus metrics on `registry`
    pub fn with_metrics(mut self, registry: &Registry) -> EngineResult<Self> {
        self.metrics = Some(BlockCacheMetrics::new(registry)?);
        Ok(self)
    }

    pub fn metrics(&self) -> Option<&BlockCacheMetrics> {
        self.metrics.as_ref()
    }

    fn seed(&self, key: &CacheKey<S, P>) -> ArgReachedSet<S, P> {
        ArgReachedSet::with_root(
            self.order,
            self.partitioning,
            key.state.clone(),
            key.precision.clone(),
        )
    }

    /// Fresh nested set seeded with the reduced entry of `key`, not cached
    pub fn private_set(&self, key: &CacheKey<S, P>) -> ArgReachedSet<S, P> {
        self.seed(key)
    }

    /// Classify `key` without side effects
    pub fn get(&self, key: &CacheKey<S, P>) -> CacheClass {
        let state = self.state.lock();
        match state.index.get(key).and_then(|id| state.entries.get(id)) {
            None => CacheClass::Miss,
            Some(entry) if entry.is_complete() => CacheClass::FullHit,
            Some(_) => CacheClass::PartialHit,
        }
    }

    /// Classify `key` and claim what the caller needs, atomically
    pub fn lookup(&self, key: &CacheKey<S, P>, worker: WorkerId) -> CacheLookup<S, P> {
        let mut state = self.state.lock();
        let Some(id) = state.index.get(key).copied() else {
            let (entry, reached) = self.register_locked(&mut state, key.clone(), worker);
            state.misses += 1;
            if let Some(m) = &self.metrics {
                m.misses.inc();
            }
            debug!(entry = %entry, block = %key.block, %worker, "block cache miss");
            return CacheLookup::Miss { entry, reached };
        };

        let mut class = None;
        if let Some(entry) = state.entries.get_mut(&id) {
            let foreign_provisional = !entry.provisional_on.is_empty()
                && entry.provisional_worker.map_or(false, |w| w != worker);
            if entry.is_checked_out() || foreign_provisional {
                // Busy
            } else if entry.is_complete() {
                entry.hits += 1;
                class = Some(CacheLookup::FullHit {
                    entry: id,
                    exits: entry.exits.clone().unwrap_or_default(),
                    provisional_on: entry.provisional_on.clone(),
                });
            } else if let Some(reached) = entry.reached.take() {
                entry.owner = Some(worker);
                class = Some(CacheLookup::PartialHit { entry: id, reached });
            }
        }

        match class {
            Some(found @ CacheLookup::FullHit { .. }) => {
                state.full_hits += 1;
                if let Some(m) = &self.metrics {
                    m.hits.inc();
                }
                trace!(entry = %id, block = %key.block, "block cache full hit");
                found
            }
            Some(found) => {
                state.partial_hits += 1;
                if let Some(m) = &self.metrics {
                    m.partial_hits.inc();
                }
                debug!(entry = %id, block = %key.block, %worker, "block cache partial hit");
                found
            }
            None => {
                state.busy += 1;
                if let Some(m) = &self.metrics {
                    m.busy.inc();
                }
                debug!(entry = %id, block = %key.block, %worker, "block cache entry busy");
                CacheLookup::Busy
            }
        }
    }

    /// Register a fresh entry for `key`, checked out to `worker`
    pub fn create_and_register(
        &self,
        key: CacheKey<S, P>,
        worker: WorkerId,
    ) -> CacheResult<(EntryId, ArgReachedSet<S, P>)> {
        let mut state = self.state.lock();
        if let Some(id) = state.index.get(&key) {
            return Err(CacheError::AlreadyRegistered(*id));
        }
        Ok(self.register_locked(&mut state, key, worker))
    }

    fn register_locked(
        &self,
        state: &mut CacheState<S, P>,
        key: CacheKey<S, P>,
        worker: WorkerId,
    ) -> (EntryId, ArgReachedSet<S, P>) {
        let id = EntryId(state.next_id);
        state.next_id += 1;
        let reached = self.seed(&key);
        state.index.insert(key.clone(), id);
        state.entries.insert(
            id,
            CacheEntry {
                key,
                reached: None,
                owner: Some(worker),
                exits: None,
                provisional_on: BTreeSet::new(),
                provisional_worker: None,
                stale: false,
                hits: 0,
            },
        );
        if let Some(m) = &self.metrics {
            m.entries.set(state.entries.len() as i64);
        }
        (id, reached)
    }

    /// Return a checked-out nested set with the outcome of its analysis
    pub fn check_in(
        &self,
        id: EntryId,
        worker: WorkerId,
        reached: ArgReachedSet<S, P>,
        outcome: CheckIn<S, P>,
    ) -> CacheResult<()> {
        let mut state = self.state.lock();
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or(CacheError::UnknownEntry(id))?;
        if !entry.is_checked_out() || entry.owner != Some(worker) {
            return Err(CacheError::NotCheckedOut { entry: id, worker });
        }

        if let CheckIn::Complete { exits, .. } = &outcome {
            if reached.has_waiting_state() && !is_violation_shortcut(exits) {
                return Err(CacheError::IncompleteExits {
                    entry: id,
                    exits: exits.len(),
                });
            }
        }

        if entry.stale || matches!(outcome, CheckIn::Discard) {
            debug!(entry = %id, stale = entry.stale, "dropping checked-in entry");
            entry.owner = None;
            entry.reached = Some(reached);
            self.remove_locked(&mut state, id);
            return Ok(());
        }

        entry.owner = None;
        entry.reached = Some(reached);
        match outcome {
            CheckIn::Complete {
                exits,
                provisional_on,
            } => {
                trace!(entry = %id, exits = exits.len(), "entry checked in complete");
                entry.exits = Some(exits);
                entry.provisional_worker = (!provisional_on.is_empty()).then_some(worker);
                entry.provisional_on = provisional_on;
            }
            CheckIn::Incomplete => {
                entry.exits = None;
            }
            CheckIn::Discard => {}
        }
        Ok(())
    }

    /// Replace the exits of a checked-in entry
    pub fn set_exit_states(&self, id: EntryId, exits: Option<Vec<ExitState<S, P>>>) -> CacheResult<()> {
        let mut state = self.state.lock();
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or(CacheError::UnknownEntry(id))?;
        let Some(reached) = &entry.reached else {
            return Err(CacheError::EntryInUse {
                entry: id,
                owner: entry.owner.unwrap_or_default(),
            });
        };
        if let Some(exits) = &exits {
            if reached.has_waiting_state() && !is_violation_shortcut(exits) {
                return Err(CacheError::IncompleteExits {
                    entry: id,
                    exits: exits.len(),
                });
            }
        }
        entry.exits = exits;
        Ok(())
    }

    /// Record that the analysis of `user` expanded the exits of `used`
    pub fn record_dependency(&self, used: EntryId, user: EntryId) {
        let mut state = self.state.lock();
        if state.entries.contains_key(&used) && state.entries.contains_key(&user) {
            state.dependencies.add_dependency(used, user);
        }
    }

    /// Remove `id` and every entry that transitively depends on it
    pub fn invalidate(&self, id: EntryId) -> Vec<EntryId> {
        let mut state = self.state.lock();
        self.invalidate_locked(&mut state, id)
    }

    pub fn invalidate_key(&self, key: &CacheKey<S, P>) -> Vec<EntryId> {
        let mut state = self.state.lock();
        match state.index.get(key).copied() {
            Some(id) => self.invalidate_locked(&mut state, id),
            None => Vec::new(),
        }
    }

    fn invalidate_locked(&self, state: &mut CacheState<S, P>, id: EntryId) -> Vec<EntryId> {
        if !state.entries.contains_key(&id) {
            return Vec::new();
        }
        let affected = state.dependencies.affected(id);
        for entry in &affected {
            self.remove_locked(state, *entry);
        }
        state.invalidations += affected.len() as u64;
        if let Some(m) = &self.metrics {
            m.invalidations.inc_by(affected.len() as u64);
        }
        debug!(entry = %id, removed = affected.len(), "invalidated block summaries");
        affected
    }

    /// Drop an entry, or mark it stale if it is checked out
    fn remove_locked(&self, state: &mut CacheState<S, P>, id: EntryId) {
        let checked_out = match state.entries.get_mut(&id) {
            Some(entry) => {
                if state.index.get(&entry.key) == Some(&id) {
                    state.index.remove(&entry.key);
                }
                entry.stale = true;
                entry.is_checked_out()
            }
            None => return,
        };
        if !checked_out {
            state.entries.remove(&id);
        }
        state.dependencies.remove(id);
        if let Some(m) = &self.metrics {
            m.entries.set(state.entries.len() as i64);
        }
    }

    /// Invalidate every entry computed under the recursion approximation of `on`
    pub fn invalidate_provisional_on(&self, on: EntryId) -> Vec<EntryId> {
        let mut state = self.state.lock();
        let pending: Vec<EntryId> = state
            .entries
            .iter()
            .filter(|(id, entry)| **id != on && entry.provisional_on.contains(&on))
            .map(|(id, _)| *id)
            .collect();
        let mut removed = Vec::new();
        for id in pending {
            removed.extend(self.invalidate_locked(&mut state, id));
        }
        removed
    }

    /// The recursion frame `on` reached its fixpoint; its marks are final
    pub fn clear_provisional(&self, on: EntryId) {
        let mut state = self.state.lock();
        for entry in state.entries.values_mut() {
            if entry.provisional_on.remove(&on) && entry.provisional_on.is_empty() {
                entry.provisional_worker = None;
            }
        }
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        let checked_out: Vec<EntryId> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_checked_out())
            .map(|(id, _)| *id)
            .collect();
        state.entries.retain(|_, entry| entry.is_checked_out());
        for id in checked_out {
            if let Some(entry) = state.entries.get_mut(&id) {
                entry.stale = true;
            }
        }
        state.index.clear();
        state.dependencies.clear();
        if let Some(m) = &self.metrics {
            m.entries.set(state.entries.len() as i64);
        }
        debug!("block cache cleared");
    }

    pub fn entry_id(&self, key: &CacheKey<S, P>) -> Option<EntryId> {
        self.state.lock().index.get(key).copied()
    }

    pub fn key_of(&self, id: EntryId) -> Option<CacheKey<S, P>> {
        self.state
            .lock()
            .entries
            .get(&id)
            .filter(|entry| !entry.stale)
            .map(|entry| entry.key.clone())
    }

    pub fn exit_states(&self, key: &CacheKey<S, P>) -> Option<Vec<ExitState<S, P>>> {
        let state = self.state.lock();
        let id = state.index.get(key)?;
        state.entries.get(id)?.exits.clone()
    }

    pub fn users(&self, id: EntryId) -> Vec<EntryId> {
        self.state.lock().dependencies.users(id)
    }

    pub fn hits(&self, id: EntryId) -> Option<u64> {
        self.state.lock().entries.get(&id).map(|entry| entry.hits)
    }

    /// Read access to a checked-in nested set and its exits
    ///
    /// The cache lock is held while `f` runs; `f` must not call back into
    /// the cache.
    pub fn with_nested_set<R>(
        &self,
        key: &CacheKey<S, P>,
        f: impl FnOnce(&ArgReachedSet<S, P>, Option<&[ExitState<S, P>]>) -> R,
    ) -> CacheResult<R> {
        let state = self.state.lock();
        let id = state.index.get(key).ok_or(CacheError::NotFound)?;
        let entry = state.entries.get(id).ok_or(CacheError::UnknownEntry(*id))?;
        match &entry.reached {
            Some(reached) => Ok(f(reached, entry.exits.as_deref())),
            None => Err(CacheError::EntryInUse {
                entry: *id,
                owner: entry.owner.unwrap_or_default(),
            }),
        }
    }

    /// Mutate a checked-in nested set, then reset its exits to unknown and
    /// invalidate its dependents
    ///
    /// If `f` fails nothing is reset or invalidated; `f` itself must leave
    /// the set unchanged on error.
    pub(crate) fn refine_nested_set<R>(
        &self,
        key: &CacheKey<S, P>,
        f: impl FnOnce(&mut ArgReachedSet<S, P>) -> EngineResult<R>,
    ) -> EngineResult<(R, Vec<EntryId>)> {
        let mut state = self.state.lock();
        let id = state
            .index
            .get(key)
            .copied()
            .ok_or_else(|| EngineError::missing_summary(key.block.to_string(), "no cache entry"))?;
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or(CacheError::UnknownEntry(id))?;
        let Some(reached) = entry.reached.as_mut() else {
            return Err(EngineError::EntryInUse {
                block: key.block.to_string(),
            });
        };
        let result = f(reached)?;
        entry.exits = None;

        // The entry itself stays as a partial hit; only its users are dropped
        let users: Vec<EntryId> = state
            .dependencies
            .affected(id)
            .into_iter()
            .filter(|other| *other != id)
            .collect();
        let mut removed = Vec::new();
        for user in users {
            if state.entries.contains_key(&user) {
                self.remove_locked(&mut state, user);
                removed.push(user);
            }
        }
        state.invalidations += removed.len() as u64;
        if let Some(m) = &self.metrics {
            m.invalidations.inc_by(removed.len() as u64);
        }
        debug!(entry = %id, removed = removed.len(), "refined nested set");
        Ok((result, removed))
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.values().filter(|e| !e.stale).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn statistics(&self) -> CacheStatistics {
        let state = self.state.lock();
        let live: Vec<&CacheEntry<S, P>> = state.entries.values().filter(|e| !e.stale).collect();
        CacheStatistics {
            entries: live.len(),
            checked_out: live.iter().filter(|e| e.is_checked_out()).count(),
            with_exits: live.iter().filter(|e| e.exits.is_some()).count(),
            provisional: live.iter().filter(|e| !e.provisional_on.is_empty()).count(),
            dependencies: state.dependencies.edge_count(),
            full_hits: state.full_hits,
            partial_hits: state.partial_hits,
            misses: state.misses,
            busy: state.busy,
            invalidations: state.invalidations,
        }
    }
}
