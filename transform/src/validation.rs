//! Validation rules over transformed payloads

use crate::path::{get_path, type_name};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Expected JSON type for a validated path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// JSON string
    String,
    /// Any JSON number
    Number,
    /// JSON number with no fractional part
    Integer,
    /// JSON boolean
    Boolean,
    /// JSON array
    Array,
    /// JSON object
    Object,
}

impl ValueType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ValueType::String => value.is_string(),
            ValueType::Number => value.is_number(),
            ValueType::Integer => value.is_i64() || value.is_u64(),
            ValueType::Boolean => value.is_boolean(),
            ValueType::Array => value.is_array(),
            ValueType::Object => value.is_object(),
        }
    }
}

/// One validation rule against a target path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Dot-path into the payload
    pub path: String,

    /// The path must be present and non-null
    #[serde(default)]
    pub required: bool,

    /// Expected JSON type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,

    /// Minimum string length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// Maximum string length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Regex the string value must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Minimum numeric value (strings holding numbers are parsed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Maximum numeric value (strings holding numbers are parsed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ValidationRule {
    /// A required-field rule
    pub fn required(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            required: true,
            value_type: None,
            min_length: None,
            max_length: None,
            pattern: None,
            min: None,
            max: None,
        }
    }
}

/// One failed validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// Path that failed
    pub path: String,

    /// What went wrong
    pub message: String,
}

/// Outcome of running validation rules against a payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no rule failed
    pub valid: bool,

    /// Every failed rule, in rule order
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    /// A passing report
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }
}

/// Run every rule against a payload
pub fn validate(payload: &Value, rules: &[ValidationRule]) -> ValidationReport {
    let mut errors = Vec::new();

    for rule in rules {
        check_rule(payload, rule, &mut errors);
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

fn check_rule(payload: &Value, rule: &ValidationRule, errors: &mut Vec<ValidationError>) {
    let value = get_path(payload, &rule.path);

    let Some(value) = value.filter(|v| !v.is_null()) else {
        if rule.required {
            errors.push(ValidationError {
                path: rule.path.clone(),
                message: "required value is missing".to_string(),
            });
        }
        return;
    };

    if let Some(expected) = rule.value_type {
        if !expected.matches(value) {
            errors.push(ValidationError {
                path: rule.path.clone(),
                message: format!("expected {:?}, found {}", expected, type_name(value)),
            });
            return;
        }
    }

    if let Some(s) = value.as_str() {
        if let Some(min) = rule.min_length {
            if s.len() < min {
                errors.push(ValidationError {
                    path: rule.path.clone(),
                    message: format!("length {} below minimum {}", s.len(), min),
                });
            }
        }
        if let Some(max) = rule.max_length {
            if s.len() > max {
                errors.push(ValidationError {
                    path: rule.path.clone(),
                    message: format!("length {} above maximum {}", s.len(), max),
                });
            }
        }
        if let Some(ref pattern) = rule.pattern {
            match regex::Regex::new(pattern) {
                Ok(re) => {
                    if !re.is_match(s) {
                        errors.push(ValidationError {
                            path: rule.path.clone(),
                            message: format!("value does not match pattern '{}'", pattern),
                        });
                    }
                }
                Err(e) => errors.push(ValidationError {
                    path: rule.path.clone(),
                    message: format!("invalid pattern '{}': {}", pattern, e),
                }),
            }
        }
    }

    if rule.min.is_some() || rule.max.is_some() {
        let numeric = value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.parse::<f64>().ok()));

        match numeric {
            Some(n) => {
                if let Some(min) = rule.min {
                    if n < min {
                        errors.push(ValidationError {
                            path: rule.path.clone(),
                            message: format!("{} below minimum {}", n, min),
                        });
                    }
                }
                if let Some(max) = rule.max {
                    if n > max {
                        errors.push(ValidationError {
                            path: rule.path.clone(),
                            message: format!("{} above maximum {}", n, max),
                        });
                    }
                }
            }
            None => errors.push(ValidationError {
                path: rule.path.clone(),
                message: "numeric bound on a non-numeric value".to_string(),
            }),
        }
    }
}
