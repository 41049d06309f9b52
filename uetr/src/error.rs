//! Error types for the UETR service

use thiserror::Error;

/// Result type for UETR operations
pub type Result<T> = std::result::Result<T, Error>;

/// UETR errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Reference does not match the 36-character UETR format
    #[error("Invalid UETR format: {0}")]
    InvalidFormat(String),

    /// Embedded timestamp segment does not parse
    #[error("Invalid UETR timestamp segment: {0}")]
    InvalidTimestamp(String),

    /// No tracking records exist for the reference
    #[error("Unknown UETR: {0}")]
    UnknownUetr(String),
}
