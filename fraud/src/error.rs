//! Error types for the fraud/risk pipeline

use thiserror::Error;

/// Result type for fraud operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fraud pipeline errors
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Assessment id is not known
    #[error("Unknown assessment: {0}")]
    UnknownAssessment(uuid::Uuid),

    /// Invalid fraud configuration
    #[error("Invalid fraud configuration '{name}': {reason}")]
    Config {
        /// Configuration name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// External fraud API failure that no fallback absorbed
    #[error("External fraud API '{api}' failed: {reason}")]
    ExternalApi {
        /// API name from the configuration
        api: String,
        /// Failure detail
        reason: String,
    },
}

/// Failure returned by an external fraud API call
#[derive(Debug, Clone)]
pub struct ApiFailure {
    /// Failure detail
    pub reason: String,

    /// Whether the failure is worth retrying
    pub transient: bool,
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl resiliency::FailureClass for ApiFailure {
    fn is_transient(&self) -> bool {
        self.transient
    }
}
