//! Engine configuration
//!
//! A single validated [`EngineConfig`] drives the reached-set layout, the
//! nested-analysis bounds, the caching policy and the worker pool size.
//! Configurations start from a [`Preset`] and are refined with builder
//! setters or loaded from YAML.

mod engine_config;
mod error;
mod preset;

pub use engine_config::{CachePolicy, EngineConfig, PartitionStrategy, WaitlistOrder};
pub use error::{ConfigError, ConfigResult};
pub use preset::Preset;
