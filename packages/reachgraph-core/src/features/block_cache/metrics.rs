//! Prometheus metrics for the block-summary cache

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Opts, Registry,
};

/// Block-summary cache metrics
#[derive(Clone)]
pub struct BlockCacheMetrics {
    pub hits: IntCounter,
    pub partial_hits: IntCounter,
    pub misses: IntCounter,
    pub busy: IntCounter,
    pub invalidations: IntCounter,
    pub entries: IntGauge,
}

impl BlockCacheMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            hits: register_int_counter_with_registry!(
                Opts::new("block_cache_hits_total", "Block summary full hits"),
                registry
            )?,
            partial_hits: register_int_counter_with_registry!(
                Opts::new(
                    "block_cache_partial_hits_total",
                    "Block summary partial hits (nested set resumed)"
                ),
                registry
            )?,
            misses: register_int_counter_with_registry!(
                Opts::new("block_cache_misses_total", "Block summary misses"),
                registry
            )?,
            busy: register_int_counter_with_registry!(
                Opts::new(
                    "block_cache_busy_total",
                    "Lookups answered busy (analyzed privately)"
                ),
                registry
            )?,
            invalidations: register_int_counter_with_registry!(
                Opts::new("block_cache_invalidations_total", "Invalidated entries"),
                registry
            )?,
            entries: register_int_gauge_with_registry!(
                Opts::new("block_cache_entries", "Block summary entry count"),
                registry
            )?,
        })
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.get() as f64;
        let total = hits + self.partial_hits.get() as f64 + self.misses.get() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

impl std::fmt::Debug for BlockCacheMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCacheMetrics")
            .field("hits", &self.hits.get())
            .field("partial_hits", &self.partial_hits.get())
            .field("misses", &self.misses.get())
            .field("busy", &self.busy.get())
            .field("invalidations", &self.invalidations.get())
            .field("entries", &self.entries.get())
            .finish()
    }
}
