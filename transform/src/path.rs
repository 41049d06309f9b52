//! Dot-path access over JSON values
//!
//! Paths like `debtor.account.id` traverse objects; numeric segments like
//! `transactions.0.amount` index arrays. Writes create intermediate
//! objects as needed.

use crate::{Error, Result};
use serde_json::{Map, Value};

/// Read the value at a dot-path, traversing maps and arrays
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Write `new_value` at a dot-path, creating intermediate objects.
///
/// Numeric segments index existing arrays (in-bounds or append-by-one);
/// every other missing segment materializes as an object.
pub fn set_path(target: &mut Value, path: &str, new_value: Value) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidPath {
            path: path.to_string(),
            reason: "empty path".to_string(),
        });
    }

    let segments: Vec<&str> = path.split('.').collect();
    let mut current = target;

    for (i, segment) in segments.iter().enumerate() {
        let last = i == segments.len() - 1;

        if current.is_null() {
            *current = Value::Object(Map::new());
        }

        match current {
            Value::Object(map) => {
                if last {
                    map.insert(segment.to_string(), new_value);
                    return Ok(());
                }
                current = map
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
            Value::Array(items) => {
                let index: usize = segment.parse().map_err(|_| Error::InvalidPath {
                    path: path.to_string(),
                    reason: format!("segment '{}' is not an array index", segment),
                })?;
                if index > items.len() {
                    return Err(Error::InvalidPath {
                        path: path.to_string(),
                        reason: format!("index {} out of bounds ({})", index, items.len()),
                    });
                }
                if index == items.len() {
                    items.push(Value::Object(Map::new()));
                }
                if last {
                    items[index] = new_value;
                    return Ok(());
                }
                current = &mut items[index];
            }
            other => {
                return Err(Error::InvalidPath {
                    path: path.to_string(),
                    reason: format!("cannot descend into {}", type_name(other)),
                });
            }
        }
    }

    unreachable!("loop always returns on the last segment")
}

/// Short JSON type name for error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
