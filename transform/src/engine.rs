//! Payload transformation engine
//!
//! Executes a mapping in six phases: field mappings, default values,
//! conditional mappings, transformation rules, then validation of the
//! final target payload.

use crate::path::{get_path, set_path};
use crate::types::{Condition, FieldMapping, PayloadSchemaMapping};
use crate::validation::{validate, ValidationReport};
use crate::{rules, Result};
use serde_json::{Map, Value};

/// Transformed payload plus the validation verdict
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    /// The built target payload
    pub payload: Value,

    /// Result of the mapping's validation rules
    pub validation: ValidationReport,
}

/// Stateless executor for payload schema mappings
pub struct PayloadTransformer;

impl PayloadTransformer {
    /// Create a transformer
    pub fn new() -> Self {
        Self
    }

    /// Execute a mapping against a source payload
    pub fn transform(
        &self,
        mapping: &PayloadSchemaMapping,
        source: &Value,
    ) -> Result<TransformOutcome> {
        let mut target = Value::Object(Map::new());

        // Phase 1: field mappings
        for (target_path, field_mapping) in &mapping.field_mappings {
            match field_mapping {
                FieldMapping::Path(source_path) => {
                    if let Some(value) = get_path(source, source_path) {
                        set_path(&mut target, target_path, value.clone())?;
                    }
                }
                FieldMapping::Config {
                    source: source_path,
                    transformation,
                    default,
                } => {
                    let extracted = get_path(source, source_path).cloned().or_else(|| default.clone());
                    if let Some(value) = extracted {
                        let value = match transformation {
                            Some(t) => rules::apply(target_path, t, &value)?,
                            None => value,
                        };
                        set_path(&mut target, target_path, value)?;
                    }
                }
            }
        }

        // Phase 2: defaults for unset target paths
        for (target_path, default) in &mapping.default_values {
            let unset = get_path(&target, target_path)
                .map(|v| v.is_null())
                .unwrap_or(true);
            if unset {
                set_path(&mut target, target_path, default.clone())?;
            }
        }

        // Phase 3: conditional mappings evaluated against the source
        for conditional in &mapping.conditional_mappings {
            if evaluate(&conditional.condition, source) {
                set_path(&mut target, &conditional.target, conditional.value.clone())?;
            }
        }

        // Phase 4: elementwise transformation rules over the target
        for (target_path, transformation) in &mapping.transformation_rules {
            if let Some(current) = get_path(&target, target_path).cloned() {
                if !current.is_null() {
                    let transformed = rules::apply(target_path, transformation, &current)?;
                    set_path(&mut target, target_path, transformed)?;
                }
            }
        }

        // Phase 5: validation of the final target
        let validation = validate(&target, &mapping.validation_rules);
        if !validation.valid {
            tracing::debug!(
                "Mapping {} produced {} validation error(s)",
                mapping.mapping_name,
                validation.errors.len()
            );
        }

        Ok(TransformOutcome {
            payload: target,
            validation,
        })
    }
}

impl Default for PayloadTransformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate a condition against the source payload
pub fn evaluate(condition: &Condition, source: &Value) -> bool {
    match condition {
        Condition::Equals { path, value } => get_path(source, path) == Some(value),
        Condition::In { path, values } => get_path(source, path)
            .map(|v| values.contains(v))
            .unwrap_or(false),
        Condition::And { conditions } => conditions.iter().all(|c| evaluate(c, source)),
        Condition::Or { conditions } => conditions.iter().any(|c| evaluate(c, source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ConditionalMapping, MappingDirection, MappingType, Transformation,
    };
    use crate::validation::ValidationRule;
    use serde_json::json;
    use uuid::Uuid;

    fn mapping() -> PayloadSchemaMapping {
        PayloadSchemaMapping::new(
            Uuid::new_v4(),
            "debit-request",
            MappingType::Object,
            MappingDirection::Request,
            1,
        )
    }

    #[test]
    fn test_field_mappings_both_shapes() {
        let mut m = mapping();
        m.field_mappings.insert(
            "debtorAccount".to_string(),
            FieldMapping::Path("fromAccount".to_string()),
        );
        m.field_mappings.insert(
            "instructedAmount".to_string(),
            FieldMapping::Config {
                source: "amount".to_string(),
                transformation: Some(Transformation::NumberFormat { decimal_places: 2 }),
                default: None,
            },
        );

        let source = json!({"fromAccount": "ACC-1", "amount": "1000.5"});
        let outcome = PayloadTransformer::new().transform(&m, &source).unwrap();

        assert_eq!(outcome.payload["debtorAccount"], json!("ACC-1"));
        assert_eq!(outcome.payload["instructedAmount"], json!("1000.50"));
    }

    #[test]
    fn test_config_default_used_when_source_missing() {
        let mut m = mapping();
        m.field_mappings.insert(
            "chargeBearer".to_string(),
            FieldMapping::Config {
                source: "charges.bearer".to_string(),
                transformation: None,
                default: Some(json!("SLEV")),
            },
        );

        let outcome = PayloadTransformer::new()
            .transform(&m, &json!({}))
            .unwrap();
        assert_eq!(outcome.payload["chargeBearer"], json!("SLEV"));
    }

    #[test]
    fn test_defaults_do_not_overwrite() {
        let mut m = mapping();
        m.field_mappings.insert(
            "currency".to_string(),
            FieldMapping::Path("ccy".to_string()),
        );
        m.default_values.insert("currency".to_string(), json!("USD"));
        m.default_values.insert("priority".to_string(), json!("NORM"));

        let outcome = PayloadTransformer::new()
            .transform(&m, &json!({"ccy": "EUR"}))
            .unwrap();
        assert_eq!(outcome.payload["currency"], json!("EUR"));
        assert_eq!(outcome.payload["priority"], json!("NORM"));
    }

    #[test]
    fn test_conditional_mapping() {
        let mut m = mapping();
        m.conditional_mappings.push(ConditionalMapping {
            condition: Condition::Equals {
                path: "paymentType".to_string(),
                value: json!("RTP"),
            },
            target: "urgency".to_string(),
            value: json!("HIGH"),
        });

        let hit = PayloadTransformer::new()
            .transform(&m, &json!({"paymentType": "RTP"}))
            .unwrap();
        assert_eq!(hit.payload["urgency"], json!("HIGH"));

        let miss = PayloadTransformer::new()
            .transform(&m, &json!({"paymentType": "ACH_CREDIT"}))
            .unwrap();
        assert!(miss.payload.get("urgency").is_none());
    }

    #[test]
    fn test_transformation_rules_run_after_mapping() {
        let mut m = mapping();
        m.field_mappings.insert(
            "currency".to_string(),
            FieldMapping::Path("ccy".to_string()),
        );
        m.transformation_rules
            .insert("currency".to_string(), Transformation::Uppercase);

        let outcome = PayloadTransformer::new()
            .transform(&m, &json!({"ccy": "usd"}))
            .unwrap();
        assert_eq!(outcome.payload["currency"], json!("USD"));
    }

    #[test]
    fn test_validation_failures_reported() {
        let mut m = mapping();
        m.validation_rules.push(ValidationRule::required("amount"));

        let outcome = PayloadTransformer::new()
            .transform(&m, &json!({}))
            .unwrap();
        assert!(!outcome.validation.valid);
        assert_eq!(outcome.validation.errors[0].path, "amount");
    }

    #[test]
    fn test_nested_source_and_target_paths() {
        let mut m = mapping();
        m.field_mappings.insert(
            "creditor.account.id".to_string(),
            FieldMapping::Path("payee.accounts.0.number".to_string()),
        );

        let source = json!({"payee": {"accounts": [{"number": "ACC-9"}]}});
        let outcome = PayloadTransformer::new().transform(&m, &source).unwrap();
        assert_eq!(
            outcome.payload["creditor"]["account"]["id"],
            json!("ACC-9")
        );
    }

    #[test]
    fn test_and_or_in_conditions() {
        let source = json!({"paymentType": "ACH_CREDIT", "currency": "USD"});

        let and = Condition::And {
            conditions: vec![
                Condition::Equals {
                    path: "paymentType".to_string(),
                    value: json!("ACH_CREDIT"),
                },
                Condition::In {
                    path: "currency".to_string(),
                    values: vec![json!("USD"), json!("CAD")],
                },
            ],
        };
        assert!(evaluate(&and, &source));

        let or = Condition::Or {
            conditions: vec![
                Condition::Equals {
                    path: "paymentType".to_string(),
                    value: json!("RTP"),
                },
                Condition::Equals {
                    path: "currency".to_string(),
                    value: json!("USD"),
                },
            ],
        };
        assert!(evaluate(&or, &source));

        let neither = Condition::And {
            conditions: vec![Condition::Equals {
                path: "paymentType".to_string(),
                value: json!("RTP"),
            }],
        };
        assert!(!evaluate(&neither, &source));
    }
}
