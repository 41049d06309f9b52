//! Transformation rule application

use crate::types::Transformation;
use crate::{Error, Result};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Apply one transformation to a JSON value.
///
/// String transformations expect strings; numeric formats accept strings or
/// numbers. A shape mismatch is a transformation error, not a silent skip.
pub fn apply(path: &str, transformation: &Transformation, value: &Value) -> Result<Value> {
    match transformation {
        Transformation::Uppercase => {
            Ok(Value::String(as_string(path, value)?.to_uppercase()))
        }
        Transformation::Lowercase => {
            Ok(Value::String(as_string(path, value)?.to_lowercase()))
        }
        Transformation::Trim => Ok(Value::String(as_string(path, value)?.trim().to_string())),
        Transformation::DateFormat {
            source_format,
            target_format,
        } => {
            let raw = as_string(path, value)?;
            let parsed = NaiveDateTime::parse_from_str(&raw, source_format)
                .or_else(|_| {
                    // Date-only inputs get a midnight time component
                    chrono::NaiveDate::parse_from_str(&raw, source_format)
                        .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is valid"))
                })
                .map_err(|e| Error::Transformation {
                    path: path.to_string(),
                    reason: format!("cannot parse '{}' as '{}': {}", raw, source_format, e),
                })?;
            Ok(Value::String(parsed.format(target_format).to_string()))
        }
        Transformation::NumberFormat { decimal_places } => {
            let decimal = as_decimal(path, value)?.round_dp(*decimal_places);
            Ok(Value::String(format!(
                "{:.*}",
                *decimal_places as usize, decimal
            )))
        }
        Transformation::CurrencyFormat { currency } => {
            let decimal = as_decimal(path, value)?.round_dp(2);
            Ok(Value::String(format!("{:.2} {}", decimal, currency)))
        }
        Transformation::RegexReplace {
            pattern,
            replacement,
        } => {
            let raw = as_string(path, value)?;
            let re = regex::Regex::new(pattern).map_err(|e| Error::Config(format!(
                "invalid regex '{}': {}",
                pattern, e
            )))?;
            Ok(Value::String(re.replace_all(&raw, replacement.as_str()).into_owned()))
        }
        Transformation::Prefix { value: prefix } => {
            Ok(Value::String(format!("{}{}", prefix, as_string(path, value)?)))
        }
        Transformation::Suffix { value: suffix } => {
            Ok(Value::String(format!("{}{}", as_string(path, value)?, suffix)))
        }
    }
}

fn as_string(path: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(Error::Transformation {
            path: path.to_string(),
            reason: format!("expected string, found {}", crate::path::type_name(other)),
        }),
    }
}

fn as_decimal(path: &str, value: &Value) -> Result<Decimal> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(Error::Transformation {
                path: path.to_string(),
                reason: format!("expected number, found {}", crate::path::type_name(other)),
            })
        }
    };
    Decimal::from_str(&raw).map_err(|e| Error::Transformation {
        path: path.to_string(),
        reason: format!("cannot parse '{}' as decimal: {}", raw, e),
    })
}
