//! Key utilities over JSON records
//!
//! Records are `serde_json::Value` objects owned by the caller. Primary
//! keys are a declared tuple of field names; a key counts as missing when
//! the field is absent or holds an empty value (`null`, `""`, `0`,
//! `false`).

use serde_json::{Map, Value};

use crate::error::{ChainError, ChainResult};

/// Is this field value too empty to act as key material?
pub fn is_blank_key(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(flag)) => !*flag,
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Number(number)) => number.as_f64() == Some(0.0),
        Some(_) => false,
    }
}

/// Per key column, the deduplicated non-blank values across the records,
/// in declared key order.
pub fn key_values(records: &[Value], keys: &[String]) -> Vec<(String, Vec<Value>)> {
    keys.iter()
        .map(|key| {
            let mut values: Vec<Value> = Vec::new();
            for record in records {
                if let Some(value) = record.get(key) {
                    if !is_blank_key(Some(value)) && !values.contains(value) {
                        values.push(value.clone());
                    }
                }
            }
            (key.clone(), values)
        })
        .collect()
}

/// Every key column projected to zero values: nothing can match.
pub fn all_columns_blank(columns: &[(String, Vec<Value>)]) -> bool {
    columns.iter().all(|(_, values)| values.is_empty())
}

/// At least one key column projected to zero values: some record lacks
/// full keys, so an exact-tuple lookup is meaningless.
pub fn any_column_blank(columns: &[(String, Vec<Value>)]) -> bool {
    columns.iter().any(|(_, values)| values.is_empty())
}

/// The primary-key tuple of one record, or `None` when any key is blank.
pub fn key_projection(record: &Value, keys: &[String]) -> Option<Map<String, Value>> {
    let mut projection = Map::new();
    for key in keys {
        let value = record.get(key);
        if is_blank_key(value) {
            return None;
        }
        projection.insert(key.clone(), value.cloned()?);
    }
    Some(projection)
}

/// Structural equality on the projected fields only.
pub fn projection_matches(record: &Value, projection: &Map<String, Value>) -> bool {
    projection
        .iter()
        .all(|(key, value)| record.get(key) == Some(value))
}

/// Borrow a record as an object map.
pub fn as_object_mut(record: &mut Value) -> ChainResult<&mut Map<String, Value>> {
    match record {
        Value::Object(object) => Ok(object),
        other => Err(ChainError::InvalidRecord(format!(
            "expected an object record, got {}",
            value_kind(other)
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
