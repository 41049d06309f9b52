//! Error types for the payment orchestrator

use thiserror::Error;

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Orchestration errors
#[derive(Error, Debug)]
pub enum Error {
    /// Resubmission with the same reference but incompatible fields
    #[error("Conflicting submission for {transaction_reference}: {reason}")]
    Conflict {
        /// Idempotency key that collided
        transaction_reference: String,
        /// What differs from the original submission
        reason: String,
    },

    /// Transaction reference is not known
    #[error("Unknown payment: {0}")]
    UnknownPayment(String),

    /// Callback arrived for a payment not awaiting one
    #[error("Unexpected clearing callback for {transaction_reference} in state {state}")]
    UnexpectedCallback {
        /// Correlated reference
        transaction_reference: String,
        /// State the payment was in
        state: String,
    },

    /// Malformed payment instruction
    #[error("Invalid payment instruction: {0}")]
    Validation(String),

    /// Fraud pipeline failure
    #[error("Fraud assessment failed: {0}")]
    Fraud(#[from] fraud::Error),

    /// Routing failure
    #[error("Routing failed: {0}")]
    Routing(#[from] routing::Error),

    /// Repair store failure
    #[error("Repair failed: {0}")]
    Repair(#[from] repair::Error),

    /// Invariant violation inside the orchestrator
    #[error("Internal orchestration error: {0}")]
    Internal(String),
}
