//! Reached set
//!
//! Unique states with their precisions in insertion order, a waitlist of
//! states still to be expanded, and a partition index answering
//! merge/coverage candidate queries.

mod concurrent;
mod partition;
mod reached;
mod waitlist;

pub use concurrent::ConcurrentReachedSet;
pub use partition::PartitionKey;
pub use reached::ReachedSet;
pub use waitlist::Waitlist;
