//! Error types for payload transformation

use thiserror::Error;

/// Result type for transformation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Transformation errors
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Dot-path cannot be written into the target shape
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// Offending path
        path: String,
        /// Why the write failed
        reason: String,
    },

    /// A transformation rule failed to apply
    #[error("Transformation failed at '{path}': {reason}")]
    Transformation {
        /// Target path
        path: String,
        /// Why the rule failed
        reason: String,
    },

    /// No mapping matches the requested name/direction/version
    #[error("No active mapping '{mapping_name}' for endpoint {endpoint_config_id}")]
    MappingNotFound {
        /// Requested mapping name
        mapping_name: String,
        /// Endpoint scope
        endpoint_config_id: uuid::Uuid,
    },

    /// Invalid rule configuration (e.g. bad regex)
    #[error("Invalid mapping configuration: {0}")]
    Config(String),
}
