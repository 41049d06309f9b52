//! Payload Transformation Engine
//!
//! Maps internal canonical payment fields onto per-endpoint external
//! schemas: field mappings over dot-paths, default values, conditional
//! mappings, elementwise transformation rules, and validation of the final
//! payload. Mappings are versioned and resolved per endpoint through the
//! [`MappingRegistry`].

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod engine;
pub mod error;
pub mod path;
pub mod registry;
pub mod rules;
pub mod types;
pub mod validation;

// Re-exports
pub use engine::{evaluate, PayloadTransformer, TransformOutcome};
pub use error::{Error, Result};
pub use path::{get_path, set_path};
pub use registry::MappingRegistry;
pub use types::{
    Condition, ConditionalMapping, FieldMapping, MappingDirection, MappingType,
    PayloadSchemaMapping, Transformation,
};
pub use validation::{validate, ValidationError, ValidationReport, ValidationRule, ValueType};
