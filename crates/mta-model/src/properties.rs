//! Property and parameter maps
//!
//! Parameters and properties are free-form value trees. They are kept as
//! JSON objects so they can be persisted and exchanged without conversion.

use crate::parameter::ParameterType;
use serde_json::Value;
use std::collections::BTreeMap;

/// A string-keyed map of arbitrary values
pub type Properties = serde_json::Map<String, Value>;

/// Declared datatypes of individual property keys
pub type PropertyTypes = BTreeMap<String, ParameterType>;

/// Canonical text form of a value, as substituted into placeholders.
///
/// Strings are inserted raw; every other value uses its JSON text.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Look up a string-typed value
pub fn get_str<'a>(properties: &'a Properties, key: &str) -> Option<&'a str> {
    properties.get(key).and_then(Value::as_str)
}
