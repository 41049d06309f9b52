//! Error types for the resiliency envelope

use thiserror::Error;

/// Result type for envelope operations
pub type Result<T> = std::result::Result<T, Error>;

/// Envelope errors
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Rate limiter bucket is empty
    #[error("Rate limit exceeded for {key}")]
    RateLimited {
        /// Envelope key that rejected the call
        key: String,
    },

    /// Circuit breaker is open
    #[error("Circuit open for {key}, retry in {retry_after_ms}ms")]
    CircuitOpen {
        /// Envelope key that rejected the call
        key: String,
        /// Remaining wait before the circuit half-opens
        retry_after_ms: u64,
    },

    /// Time limiter expired
    #[error("Operation timed out after {timeout_ms}ms")]
    TimedOut {
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Bulkhead has no free permits
    #[error("Bulkhead full for {key} ({max_concurrent_calls} concurrent calls)")]
    BulkheadFull {
        /// Envelope key that rejected the call
        key: String,
        /// Configured concurrency limit
        max_concurrent_calls: u32,
    },

    /// Retry budget exhausted over transient failures
    #[error("Downstream unavailable after {attempts} attempts: {last_error}")]
    DownstreamUnavailable {
        /// Attempts made before giving up
        attempts: u32,
        /// Last observed failure
        last_error: String,
    },

    /// Invalid configuration
    #[error("Invalid resiliency configuration: {0}")]
    Config(String),

    /// Queued message store error
    #[error("Queued message error: {0}")]
    Queue(String),

    /// Unknown service or key
    #[error("Unknown service: {0}")]
    UnknownService(String),
}

impl Error {
    /// Whether the envelope itself would consider this failure transient.
    ///
    /// Timeouts and full bulkheads may clear on a later attempt; an open
    /// circuit or empty bucket will not clear within one retry loop.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::TimedOut { .. } | Error::BulkheadFull { .. } | Error::DownstreamUnavailable { .. }
        )
    }
}

/// Classification contract for wrapped operation errors.
///
/// The envelope retries transient failures and records them against the
/// circuit breaker; non-transient (business) failures surface immediately
/// and do not trip the circuit.
pub trait FailureClass {
    /// Whether the failure is transient and worth retrying.
    fn is_transient(&self) -> bool;
}

/// Outcome of an enveloped call.
#[derive(Debug)]
pub enum CallError<E> {
    /// The envelope rejected or aborted the call
    Envelope(Error),
    /// The wrapped operation failed on its own terms
    Inner(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Envelope(e) => write!(f, "{}", e),
            CallError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for CallError<E> {}

impl<E> CallError<E> {
    /// Whether the failure is worth retrying at a later time.
    pub fn is_transient(&self) -> bool
    where
        E: FailureClass,
    {
        match self {
            CallError::Envelope(e) => {
                e.is_transient() || matches!(e, Error::CircuitOpen { .. } | Error::RateLimited { .. })
            }
            CallError::Inner(e) => e.is_transient(),
        }
    }
}
