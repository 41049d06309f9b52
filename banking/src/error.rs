//! Error types and failure classification for core banking adapters
//!
//! Every adapter failure carries a classification consumed by the
//! orchestrator: transient failures ride the resiliency envelope's retry,
//! business rejections go straight to transaction repair, and everything
//! else is an internal fault.

use thiserror::Error;

/// Result type for adapter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Timeouts, connection failures, 5xx; safe to retry
    Transient,
    /// Downstream rejected the operation on business grounds; never retried
    Business,
    /// The adapter does not implement this capability
    NotSupported,
    /// Bugs and invariant violations
    Internal,
}

/// Well-known business rejection codes
pub mod business_codes {
    /// Debtor account cannot cover the amount
    pub const INSUFFICIENT_FUNDS: &str = "INSUFFICIENT_FUNDS";
    /// Account has been closed
    pub const ACCOUNT_CLOSED: &str = "ACCOUNT_CLOSED";
    /// Account is frozen pending investigation
    pub const ACCOUNT_FROZEN: &str = "ACCOUNT_FROZEN";
    /// Account does not exist at this bank
    pub const ACCOUNT_NOT_FOUND: &str = "ACCOUNT_NOT_FOUND";
    /// Transaction breaches a configured limit
    pub const LIMIT_EXCEEDED: &str = "LIMIT_EXCEEDED";
    /// Duplicate transaction reference at the core
    pub const DUPLICATE_TRANSACTION: &str = "DUPLICATE_TRANSACTION";
}

/// Core banking adapter errors
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Could not reach the downstream
    #[error("Connection error: {0}")]
    Connection(String),

    /// Downstream did not answer in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Downstream returned an HTTP error status
    #[error("Downstream returned {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },

    /// Business rejection from the core
    #[error("Business rejection {code}: {message}")]
    Business {
        /// Rejection code (see [`business_codes`])
        code: String,
        /// Human-readable reason
        message: String,
    },

    /// Capability not implemented by this adapter
    #[error("Operation '{0}' not supported by this adapter")]
    NotSupported(String),

    /// Malformed or invalid ISO 20022 document
    #[error("ISO 20022 error: {0}")]
    Iso20022(String),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No active configuration for the tenant/bank pair
    #[error("No core banking configuration for tenant {tenant_id}, bank {bank_code}")]
    ConfigNotFound {
        /// Requesting tenant
        tenant_id: String,
        /// Requested bank code
        bank_code: String,
    },

    /// Bug or invariant violation inside the adapter
    #[error("Internal adapter error: {0}")]
    Internal(String),
}

impl Error {
    /// Classify this failure for the orchestrator
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection(_) | Error::Timeout(_) => ErrorKind::Transient,
            Error::Http { status, .. } if *status >= 500 => ErrorKind::Transient,
            Error::Http { .. } => ErrorKind::Internal,
            Error::Business { .. } => ErrorKind::Business,
            Error::NotSupported(_) => ErrorKind::NotSupported,
            Error::Iso20022(_) | Error::Serialization(_) => ErrorKind::Internal,
            Error::ConfigNotFound { .. } => ErrorKind::Internal,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Business rejection: insufficient funds
    pub fn insufficient_funds(account: &str) -> Self {
        Error::Business {
            code: business_codes::INSUFFICIENT_FUNDS.to_string(),
            message: format!("account {} cannot cover the requested amount", account),
        }
    }

    /// Business rejection: account closed
    pub fn account_closed(account: &str) -> Self {
        Error::Business {
            code: business_codes::ACCOUNT_CLOSED.to_string(),
            message: format!("account {} is closed", account),
        }
    }

    /// Business rejection: account frozen
    pub fn account_frozen(account: &str) -> Self {
        Error::Business {
            code: business_codes::ACCOUNT_FROZEN.to_string(),
            message: format!("account {} is frozen", account),
        }
    }

    /// Business rejection: unknown account
    pub fn account_not_found(account: &str) -> Self {
        Error::Business {
            code: business_codes::ACCOUNT_NOT_FOUND.to_string(),
            message: format!("account {} does not exist", account),
        }
    }

    /// The business rejection code, when this is a business failure
    pub fn business_code(&self) -> Option<&str> {
        match self {
            Error::Business { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl resiliency::FailureClass for Error {
    fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
