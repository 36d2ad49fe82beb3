//! Validation of driver-returned location metadata.
//!
//! Drivers may attach a side-channel description to each stored object.
//! Downstream consumers persist it as JSON, so it is restricted to objects,
//! arrays and strings. Invalid values are rejected, never coerced or dropped.

use serde_json::Value;

use stowage_common::{Error, Result};

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn invalid(path: &str, value: &Value) -> Error {
    Error::InvalidMetadata {
        driver: String::new(),
        path: path.to_string(),
        observed: type_name(value),
    }
}

/// Recursively check that `value` only contains objects, arrays and strings.
///
/// `path` names the position of `value` within the enclosing structure.
/// Object members extend it with `.key` (or just `key` at the top level),
/// array elements with `[index]`.
///
/// # Errors
/// - `InvalidMetadata` naming the first offending path and its type. The
///   `driver` field is left empty; [`validate_location_metadata`] fills it.
pub fn validate(value: &Value, path: &str) -> Result<()> {
    match value {
        Value::Object(map) => {
            for (key, member) in map {
                let member_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                validate(member, &member_path)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                validate(item, &format!("{}[{}]", path, index))?;
            }
            Ok(())
        }
        Value::String(_) => Ok(()),
        other => Err(invalid(path, other)),
    }
}

/// Validate the metadata returned by `driver`'s add operation.
///
/// The top-level value must be an object.
pub fn validate_location_metadata(driver: &str, metadata: &Value) -> Result<()> {
    if !metadata.is_object() {
        return Err(Error::InvalidMetadata {
            driver: driver.to_string(),
            path: String::new(),
            observed: type_name(metadata),
        });
    }

    validate(metadata, "").map_err(|e| match e {
        Error::InvalidMetadata { path, observed, .. } => Error::InvalidMetadata {
            driver: driver.to_string(),
            path,
            observed,
        },
        other => other,
    })
}
