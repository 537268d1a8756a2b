//! Structural traversal of property trees
//!
//! Every string leaf reachable below a map key is handed to a callback
//! together with its key path, and replaced by whatever the callback returns.
//! Lists keep the key path of their enclosing map entry. Numbers, booleans
//! and nulls are copied through untouched.

use mta_model::{DeploymentDescriptor, Properties};
use serde_json::Value;
use std::convert::Infallible;

/// Separator between the components of a nested key path
pub const KEY_SEPARATOR: char = '#';

/// Visit every string leaf of `properties`, allowing the callback to fail
pub fn try_visit<E, F>(properties: &Properties, visit: &mut F) -> Result<Properties, E>
where
    F: FnMut(&str, &str) -> Result<Value, E>,
{
    visit_map(None, properties, visit)
}

/// Visit every string leaf of `properties`
pub fn visit<F>(properties: &Properties, mut visit: F) -> Properties
where
    F: FnMut(&str, &str) -> Value,
{
    let result = try_visit(properties, &mut |key, value| {
        Ok::<_, Infallible>(visit(key, value))
    });
    match result {
        Ok(properties) => properties,
        Err(never) => match never {},
    }
}

/// Visit every string leaf of `properties`, passing the top-level key the
/// leaf sits under instead of its full key path.
///
/// Keys may contain [`KEY_SEPARATOR`] themselves, so a joined path cannot be
/// split back into its components.
pub fn visit_top_level<F>(properties: &Properties, mut visit: F) -> Properties
where
    F: FnMut(&str, &str) -> Value,
{
    properties
        .iter()
        .map(|(key, value)| {
            let mut leaf = |_: &str, text: &str| Ok::<_, Infallible>(visit(key, text));
            let value = match visit_value(key, value, &mut leaf) {
                Ok(value) => value,
                Err(never) => match never {},
            };
            (key.clone(), value)
        })
        .collect()
}

/// Apply a leaf visitor to every parameter and property map of a descriptor.
///
/// The callback receives the owning container's name as its first argument.
pub fn try_visit_descriptor<E, F>(
    descriptor: &DeploymentDescriptor,
    visit: &mut F,
) -> Result<DeploymentDescriptor, E>
where
    F: FnMut(&str, &str, &str) -> Result<Value, E>,
{
    let mut result = descriptor.clone();
    let id = descriptor.id.clone();
    result.parameters = try_visit(&descriptor.parameters, &mut |k, v| visit(&id, k, v))?;

    for module in &mut result.modules {
        let owner = module.name.clone();
        let mut leaf = |k: &str, v: &str| visit(&owner, k, v);
        module.parameters = try_visit(&module.parameters, &mut leaf)?;
        module.properties = try_visit(&module.properties, &mut leaf)?;
        for dependency in module.requires.iter_mut() {
            dependency.parameters = try_visit(&dependency.parameters, &mut leaf)?;
            dependency.properties = try_visit(&dependency.properties, &mut leaf)?;
        }
        for dependency in module.provides.iter_mut() {
            dependency.parameters = try_visit(&dependency.parameters, &mut leaf)?;
            dependency.properties = try_visit(&dependency.properties, &mut leaf)?;
        }
    }

    for resource in &mut result.resources {
        let owner = resource.name.clone();
        let mut leaf = |k: &str, v: &str| visit(&owner, k, v);
        resource.parameters = try_visit(&resource.parameters, &mut leaf)?;
        resource.properties = try_visit(&resource.properties, &mut leaf)?;
        for dependency in resource.requires.iter_mut() {
            dependency.parameters = try_visit(&dependency.parameters, &mut leaf)?;
            dependency.properties = try_visit(&dependency.properties, &mut leaf)?;
        }
    }

    Ok(result)
}

fn visit_map<E, F>(prefix: Option<&str>, map: &Properties, visit: &mut F) -> Result<Properties, E>
where
    F: FnMut(&str, &str) -> Result<Value, E>,
{
    let mut result = Properties::new();
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{prefix}{KEY_SEPARATOR}{key}"),
            None => key.clone(),
        };
        result.insert(key.clone(), visit_value(&path, value, visit)?);
    }
    Ok(result)
}

fn visit_value<E, F>(path: &str, value: &Value, visit: &mut F) -> Result<Value, E>
where
    F: FnMut(&str, &str) -> Result<Value, E>,
{
    Ok(match value {
        Value::String(s) => visit(path, s)?,
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| visit_value(path, item, visit))
                .collect::<Result<_, E>>()?,
        ),
        Value::Object(map) => Value::Object(visit_map(Some(path), map, visit)?),
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_visits_nested_leaves_with_key_paths() {
        let input = props(json!({
            "a": "x",
            "b": {"c": "y", "d": 3},
            "e": ["z", {"f": "w"}, true]
        }));
        let mut seen = Vec::new();
        let output = visit(&input, |key, value| {
            seen.push((key.to_string(), value.to_string()));
            Value::String(value.to_uppercase())
        });

        assert_eq!(
            Value::Object(output),
            json!({"a": "X", "b": {"c": "Y", "d": 3}, "e": ["Z", {"f": "W"}, true]})
        );
        assert!(seen.contains(&("b#c".to_string(), "y".to_string())));
        assert!(seen.contains(&("e".to_string(), "z".to_string())));
        assert!(seen.contains(&("e#f".to_string(), "w".to_string())));
    }

    #[test]
    fn test_top_level_keys_may_contain_separator() {
        let input = props(json!({"a#b": {"c": "x"}, "d": ["y"]}));
        let mut seen = Vec::new();
        let output = visit_top_level(&input, |key, value| {
            seen.push(key.to_string());
            Value::String(value.to_uppercase())
        });
        assert_eq!(Value::Object(output), json!({"a#b": {"c": "X"}, "d": ["Y"]}));
        assert_eq!(seen, ["a#b", "d"]);
    }

    #[test]
    fn test_failure_stops_traversal() {
        let input = props(json!({"a": "ok", "b": "bad"}));
        let result: Result<Properties, String> = try_visit(&input, &mut |key, value| {
            if value == "bad" {
                Err(key.to_string())
            } else {
                Ok(Value::String(value.into()))
            }
        });
        assert_eq!(result.unwrap_err(), "b");
    }
}
