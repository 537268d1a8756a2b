//! List-dependency expansion
//!
//! When a required dependency binds to several instances, it is replaced by
//! one dependency per instance. Every property that references the original
//! name is duplicated once per instance, with its references rewritten to
//! the instance name.

use crate::pattern::{Reference, ReferencePattern};
use crate::visitor::visit_top_level;
use mta_model::Properties;
use serde_json::Value;

/// Rewrites references to one dependency name into a set of new names
#[derive(Debug, Clone)]
pub struct PropertiesExpander {
    original: String,
    new_names: Vec<String>,
    pattern: ReferencePattern,
    expanded: Vec<String>,
}

impl PropertiesExpander {
    pub fn new(original: impl Into<String>, new_names: Vec<String>) -> Self {
        Self {
            original: original.into(),
            new_names,
            pattern: ReferencePattern::FullyQualified,
            expanded: Vec::new(),
        }
    }

    /// Expander for the properties of the required dependency itself, where
    /// short references name the original dependency.
    ///
    /// Short references stay short in every variant.
    pub fn scoped(original: impl Into<String>, new_names: Vec<String>) -> Self {
        let original = original.into();
        Self {
            pattern: ReferencePattern::scoped(original.clone()),
            ..Self::new(original, new_names)
        }
    }

    /// One copy of `properties` per new name.
    ///
    /// Without new names nothing is produced and no key is recorded.
    pub fn expand(&mut self, properties: &Properties) -> Vec<Properties> {
        let mut touched = Vec::new();
        let variants = self
            .new_names
            .iter()
            .map(|name| {
                let render = self.pattern.rescoped(name);
                visit_top_level(properties, |key, text| {
                    let (text, replaced) = self.pattern.replace(text, |reference| {
                        (reference.dependency == self.original).then(|| {
                            render.render(&Reference::new(name.as_str(), reference.key.as_str()))
                        })
                    });
                    if replaced {
                        touched.push(key.to_string());
                    }
                    Value::String(text)
                })
            })
            .collect();

        for key in touched {
            if !self.expanded.contains(&key) {
                self.expanded.push(key);
            }
        }
        variants
    }

    /// Top-level keys rewritten so far, in the order first seen
    pub fn expanded_properties(&self) -> &[String] {
        &self.expanded
    }
}

/// Top-level keys of `properties` whose values reference `dependency`
pub fn referencing_properties(dependency: &str, properties: &Properties) -> Vec<String> {
    let pattern = ReferencePattern::FullyQualified;
    let mut keys: Vec<String> = Vec::new();
    visit_top_level(properties, |key, text| {
        let references = pattern
            .matches(text)
            .any(|found| found.reference.dependency == dependency);
        if references && !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
        Value::String(text.to_string())
    });
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("cfg.{i}")).collect()
    }

    #[test]
    fn test_expand_rewrites_references() {
        let mut expander = PropertiesExpander::new("cfg", names(2));
        let variants = expander.expand(&props(json!({
            "url": "${cfg/url}",
            "nested": {"user": "${cfg/user}@${db/host}"},
            "static": "x",
            "port": 80
        })));

        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0]["url"], json!("${cfg.0/url}"));
        assert_eq!(variants[1]["url"], json!("${cfg.1/url}"));
        assert_eq!(variants[1]["nested"]["user"], json!("${cfg.1/user}@${db/host}"));
        assert_eq!(variants[0]["static"], json!("x"));
        assert_eq!(variants[0]["port"], json!(80));
        assert_eq!(expander.expanded_properties(), ["nested", "url"]);
    }

    #[test]
    fn test_expand_with_no_names_is_a_no_op() {
        let mut expander = PropertiesExpander::new("cfg", Vec::new());
        let variants = expander.expand(&props(json!({"url": "${cfg/url}"})));
        assert!(variants.is_empty());
        assert!(expander.expanded_properties().is_empty());
    }

    #[test]
    fn test_expanded_keys_are_deduplicated_across_calls() {
        let mut expander = PropertiesExpander::new("cfg", names(1));
        expander.expand(&props(json!({"b": "${cfg/x}", "a": "${cfg/y}"})));
        expander.expand(&props(json!({"a": "${cfg/z}", "c": "${cfg/z}"})));
        assert_eq!(expander.expanded_properties(), ["a", "b", "c"]);
    }

    #[test]
    fn test_scoped_expansion_keeps_short_form() {
        let mut expander = PropertiesExpander::scoped("cfg", names(2));
        let variants = expander.expand(&props(json!({
            "endpoint": "${url}",
            "full": "${cfg/url}"
        })));
        assert_eq!(variants[1]["endpoint"], json!("${url}"));
        assert_eq!(variants[1]["full"], json!("${url}"));
        assert_eq!(expander.expanded_properties(), ["endpoint", "full"]);
    }

    #[test]
    fn test_referencing_properties() {
        let properties = props(json!({
            "a": "${cfg/url}",
            "b": {"c": ["${cfg/x}", "${cfg/y}"]},
            "d": "${other/url}",
            "e": r"\${cfg/escaped}",
            "f#g": {"h": "${cfg/url}"}
        }));
        assert_eq!(referencing_properties("cfg", &properties), ["a", "b", "f#g"]);
    }
}
