//! Candidate partition keys

use crate::config::PartitionStrategy;
use crate::shared::models::LocationId;
use crate::shared::ports::AbstractState;

/// Key of the partition a state belongs to
///
/// Two states that may merge with or cover each other always share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartitionKey {
    Location(LocationId),
    All,
}

impl PartitionKey {
    pub fn of<S: AbstractState>(strategy: PartitionStrategy, state: &S) -> Self {
        match strategy {
            PartitionStrategy::Location => Self::Location(state.location()),
            PartitionStrategy::Single => Self::All,
        }
    }
}
