//! Error types for transaction repair

use crate::types::RepairStatus;
use thiserror::Error;
use uuid::Uuid;

/// Result type for repair operations
pub type Result<T> = std::result::Result<T, Error>;

/// Repair errors
#[derive(Error, Debug)]
pub enum Error {
    /// Repair id is not known
    #[error("Unknown repair: {0}")]
    UnknownRepair(Uuid),

    /// Concurrent mutation lost the optimistic version race
    #[error("Conflicting repair mutation on {id}: expected version {expected}, found {actual}")]
    ConflictingRepair {
        /// Repair id
        id: Uuid,
        /// Version the caller read
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// Terminal repairs are immutable
    #[error("Repair {id} is terminal ({status:?}) and cannot change")]
    TerminalState {
        /// Repair id
        id: Uuid,
        /// Terminal status
        status: RepairStatus,
    },

    /// Requested lifecycle transition is not allowed
    #[error("Invalid repair transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current status
        from: RepairStatus,
        /// Requested status
        to: RepairStatus,
    },

    /// Corrective action failed against the core
    #[error("Corrective action failed: {0}")]
    Adapter(#[from] banking::Error),
}
