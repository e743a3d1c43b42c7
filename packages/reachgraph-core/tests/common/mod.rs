//! Common test utilities for reachgraph-core
//!
//! A small explicit-value domain over integer variables and builders for
//! the programs the integration tests run on.

#![allow(dead_code)]

mod domain;
mod programs;

pub use domain::*;
pub use programs::*;
