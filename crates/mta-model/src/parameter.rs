//! Declared property datatypes
//!
//! Reference resolution renders every substituted value as text. Properties
//! that declare a datatype are converted back after resolution.

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Datatype a property value is converted to after resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Boolean,
    Integer,
    String,
}

impl ParameterType {
    /// Convert a value to this datatype
    pub fn convert(self, key: &str, value: &Value) -> Result<Value> {
        match self {
            ParameterType::Boolean => to_boolean(value),
            ParameterType::Integer => to_integer(value),
            ParameterType::String => Some(Value::String(crate::properties::to_text(value))),
        }
        .ok_or_else(|| ModelError::InvalidPropertyType {
            key: key.to_string(),
            expected: self.to_string(),
            value: value.to_string(),
        })
    }
}

fn to_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
        _ => None,
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterType::Boolean => write!(f, "boolean"),
            ParameterType::Integer => write!(f, "integer"),
            ParameterType::String => write!(f, "string"),
        }
    }
}

impl FromStr for ParameterType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(ParameterType::Boolean),
            "int" | "integer" => Ok(ParameterType::Integer),
            "str" | "string" => Ok(ParameterType::String),
            other => Err(ModelError::UnknownDatatype(other.to_string())),
        }
    }
}
