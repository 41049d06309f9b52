//! Mapping definitions executed by the transformation engine

use crate::validation::ValidationRule;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Structural flavor of a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingType {
    /// Single-field mapping
    Field,
    /// Whole-object mapping
    Object,
    /// Array element mapping
    Array,
    /// Nested structure mapping
    Nested,
    /// Condition-driven mapping
    Conditional,
    /// Value transformation mapping
    Transformation,
    /// Caller-defined semantics
    Custom,
}

/// Which payload direction a mapping applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingDirection {
    /// Outbound request payloads
    Request,
    /// Inbound response payloads
    Response,
    /// Both directions
    Bidirectional,
}

impl MappingDirection {
    /// Whether a stored mapping direction serves a requested one
    pub fn covers(&self, requested: MappingDirection) -> bool {
        matches!(self, MappingDirection::Bidirectional) || *self == requested
    }
}

/// One field mapping entry: a bare source path or a configured mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldMapping {
    /// Plain dot-path into the source payload
    Path(String),
    /// Configured mapping with optional per-field transformation and default
    Config {
        /// Dot-path into the source payload
        source: String,
        /// Transformation applied to the extracted value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transformation: Option<Transformation>,
        /// Fallback when the source path is absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },
}

/// Condition evaluated against the source payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    /// Source path equals a literal
    Equals {
        /// Dot-path into the source payload
        path: String,
        /// Literal to compare against
        value: Value,
    },
    /// Source path value is one of the listed literals
    In {
        /// Dot-path into the source payload
        path: String,
        /// Accepted literals
        values: Vec<Value>,
    },
    /// All sub-conditions hold
    And {
        /// Sub-conditions
        conditions: Vec<Condition>,
    },
    /// Any sub-condition holds
    Or {
        /// Sub-conditions
        conditions: Vec<Condition>,
    },
}

/// Conditional write into the target payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalMapping {
    /// Condition over the source payload
    pub condition: Condition,

    /// Target dot-path written when the condition holds
    pub target: String,

    /// Value written
    pub value: Value,
}

/// Elementwise value transformation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transformation {
    /// ASCII uppercase
    Uppercase,
    /// ASCII lowercase
    Lowercase,
    /// Trim surrounding whitespace
    Trim,
    /// Reparse a date string into another format
    DateFormat {
        /// chrono format of the incoming value
        source_format: String,
        /// chrono format of the outgoing value
        target_format: String,
    },
    /// Fixed decimal places
    NumberFormat {
        /// Decimal places to keep
        decimal_places: u32,
    },
    /// Fixed decimal places with a currency code suffix
    CurrencyFormat {
        /// ISO 4217 code appended to the amount
        currency: String,
    },
    /// Regex substitution
    RegexReplace {
        /// Pattern to replace
        pattern: String,
        /// Replacement text
        replacement: String,
    },
    /// Prepend a literal
    Prefix {
        /// Literal prefix
        value: String,
    },
    /// Append a literal
    Suffix {
        /// Literal suffix
        value: String,
    },
}

/// Versioned payload mapping for one endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadSchemaMapping {
    /// Mapping ID
    pub id: Uuid,

    /// Owning endpoint configuration
    pub endpoint_config_id: Uuid,

    /// Mapping name; at most one active mapping per name and version
    pub mapping_name: String,

    /// Structural flavor
    pub mapping_type: MappingType,

    /// Direction served
    pub direction: MappingDirection,

    /// target path -> source mapping, applied first
    pub field_mappings: BTreeMap<String, FieldMapping>,

    /// target path -> literal, applied to still-unset paths
    pub default_values: BTreeMap<String, Value>,

    /// Conditional writes, applied after defaults
    pub conditional_mappings: Vec<ConditionalMapping>,

    /// target path -> transformation, applied after conditionals
    pub transformation_rules: BTreeMap<String, Transformation>,

    /// Rules run against the final target payload
    pub validation_rules: Vec<ValidationRule>,

    /// Mapping version; requests may pin one
    pub version: u32,

    /// Higher priority wins when several versions are active
    pub priority: i32,

    /// Inactive mappings are never resolved
    pub active: bool,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl PayloadSchemaMapping {
    /// Create an empty active mapping shell
    pub fn new(
        endpoint_config_id: Uuid,
        mapping_name: impl Into<String>,
        mapping_type: MappingType,
        direction: MappingDirection,
        version: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            endpoint_config_id,
            mapping_name: mapping_name.into(),
            mapping_type,
            direction,
            field_mappings: BTreeMap::new(),
            default_values: BTreeMap::new(),
            conditional_mappings: Vec::new(),
            transformation_rules: BTreeMap::new(),
            validation_rules: Vec::new(),
            version,
            priority: 0,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
