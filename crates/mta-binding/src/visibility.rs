//! Visibility declarations of provided dependencies

use crate::error::{BindingError, Result};
use mta_model::Visibility;
use serde_json::Value;

/// Parameter of a provided dependency listing the scopes that may consume it
pub const VISIBILITY_PARAMETER: &str = "visibility";

/// Validate and parse a visibility declaration.
///
/// The value must be a list of maps with string keys and string values, each
/// naming an `org` and optionally a `space`.
pub fn parse_visibility(provider: &str, value: &Value) -> Result<Vec<Visibility>> {
    let invalid = |reason: String| BindingError::InvalidVisibilityDeclaration {
        provider: provider.to_string(),
        reason,
    };

    let elements = value
        .as_array()
        .ok_or_else(|| invalid(format!("expected a list, got {value}")))?;

    elements
        .iter()
        .map(|element| {
            let map = element
                .as_object()
                .ok_or_else(|| invalid(format!("expected a map, got {element}")))?;
            if let Some((key, _)) = map.iter().find(|(_, v)| !v.is_string()) {
                return Err(invalid(format!("value of \"{key}\" must be a string")));
            }
            let org = map
                .get("org")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("every element must declare an \"org\"".to_string()))?;
            Ok(match map.get("space").and_then(Value::as_str) {
                Some(space) => Visibility::space(org, space),
                None => Visibility::org(org),
            })
        })
        .collect()
}
