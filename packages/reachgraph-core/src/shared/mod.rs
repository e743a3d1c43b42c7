//! Shared models, domain ports and the cooperative shutdown signal

pub mod models;
pub mod ports;
pub mod shutdown;
