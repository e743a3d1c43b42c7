//! Error types for the block-summary cache

use super::types::{EntryId, WorkerId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Unknown cache entry {0}")]
    UnknownEntry(EntryId),

    #[error("Cache entry {entry} is checked out by {owner}")]
    EntryInUse { entry: EntryId, owner: WorkerId },

    #[error("Cache entry {entry} is not checked out by {worker}")]
    NotCheckedOut { entry: EntryId, worker: WorkerId },

    #[error("A cache entry for this key already exists ({0})")]
    AlreadyRegistered(EntryId),

    #[error("Incomplete analysis of {entry} must report exactly one target exit, got {exits} exits")]
    IncompleteExits { entry: EntryId, exits: usize },

    #[error("Cache not found")]
    NotFound,
}

pub type CacheResult<T> = Result<T, CacheError>;
