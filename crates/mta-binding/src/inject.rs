//! Injection of matched entries into a partially resolved descriptor
//!
//! Each filter resource is replaced by the content of the entries bound to
//! it. A plain dependency needs exactly one entry. A list dependency is
//! expanded into one instance dependency per entry, named
//! `<dependency><separator><index>`, and its list property collects the
//! properties of every instance.
//!
//! Entry content is escaped on the way in so that placeholders published
//! by another MTA are never resolved against this descriptor.

use crate::error::{BindingError, Result};
use crate::matcher::MatchResult;
use crate::parser::ConfigurationFilterParser;
use mta_model::{ConfigurationEntry, DeploymentDescriptor, Properties, RequiredDependency, Resource};
use mta_resolver::visitor::visit;
use mta_resolver::{referencing_properties, EscapeSequenceReplacer, PropertiesExpander, ReferencePattern};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Bind the matched entries of every filter resource of `descriptor`.
///
/// Inactive filter resources are removed together with the dependencies on
/// them. Fails when a plain dependency has no match or more than one, unless
/// the resource is optional, and when the filter of a mandatory resource
/// could not be evaluated.
#[instrument(skip_all, fields(mta = %descriptor.id))]
pub fn inject_entries(
    descriptor: &DeploymentDescriptor,
    matches: &BTreeMap<String, MatchResult>,
    separator: &str,
    replacer: &EscapeSequenceReplacer,
) -> Result<DeploymentDescriptor> {
    let mut injected = descriptor.clone();
    let filter_resources = descriptor
        .resources
        .iter()
        .filter(|r| ConfigurationFilterParser::is_filter_resource(r));

    for resource in filter_resources {
        let content: Vec<Properties> = bound_entries(resource, matches)?
            .iter()
            .map(|entry| escape_content(&entry.content, replacer))
            .collect();
        let consumers = Consumers {
            resource,
            content: &content,
            separator,
        };

        let mut listed = false;
        for module in &mut injected.modules {
            listed |= consumers.rewrite(&mut module.properties, &mut module.requires)?;
        }
        for other in &mut injected.resources {
            listed |= consumers.rewrite(&mut other.properties, &mut other.requires)?;
        }
        replace_resource(&mut injected.resources, resource, &content, listed, separator);

        debug!(resource = %resource.name, entries = content.len(), listed, "Injected entries");
    }
    Ok(injected)
}

/// Name of the `index`th instance of a list dependency
pub fn instance_name(dependency: &str, separator: &str, index: usize) -> String {
    format!("{dependency}{separator}{index}")
}

fn bound_entries<'m>(
    resource: &Resource,
    matches: &'m BTreeMap<String, MatchResult>,
) -> Result<&'m [ConfigurationEntry]> {
    if !resource.active {
        return Ok(&[]);
    }
    match matches.get(&resource.name) {
        Some(MatchResult::Invalid(reason)) if !resource.optional => Err(BindingError::InvalidFilter {
            resource: resource.name.clone(),
            reason: reason.clone(),
        }),
        Some(result) => Ok(result.entries()),
        None => Ok(&[]),
    }
}

fn escape_content(content: &Properties, replacer: &EscapeSequenceReplacer) -> Properties {
    visit(content, |_, text| Value::String(replacer.escape(text)))
}

/// Dependencies on one filter resource, and the entry content bound to it
struct Consumers<'a> {
    resource: &'a Resource,
    content: &'a [Properties],
    separator: &'a str,
}

impl Consumers<'_> {
    /// Rewrite one owner's dependencies on the resource. Returns whether a
    /// list dependency was among them.
    fn rewrite(
        &self,
        properties: &mut Properties,
        requires: &mut Vec<RequiredDependency>,
    ) -> Result<bool> {
        let mut listed = false;
        let mut rewritten = Vec::with_capacity(requires.len());
        for dependency in std::mem::take(requires) {
            if dependency.name != self.resource.name {
                rewritten.push(dependency);
                continue;
            }
            match dependency.list.clone() {
                Some(list) => {
                    listed = true;
                    rewritten.extend(self.expand_list(properties, &dependency, &list));
                }
                None => {
                    if self.bind_single(properties, &dependency)? {
                        rewritten.push(dependency);
                    }
                }
            }
        }
        *requires = rewritten;
        Ok(listed)
    }

    /// Whether a plain dependency survives binding
    fn bind_single(&self, properties: &mut Properties, dependency: &RequiredDependency) -> Result<bool> {
        let resource = &self.resource.name;
        match self.content.len() {
            1 => Ok(true),
            0 if !self.resource.active || self.resource.optional => {
                for key in referencing_properties(&dependency.name, properties) {
                    properties.remove(&key);
                }
                debug!(resource = %resource, "Dropped dependency without entries");
                Ok(false)
            }
            0 => Err(BindingError::NoMatch {
                resource: resource.clone(),
            }),
            count => Err(BindingError::AmbiguousMatch {
                resource: resource.clone(),
                count,
            }),
        }
    }

    fn expand_list(
        &self,
        properties: &mut Properties,
        dependency: &RequiredDependency,
        list: &str,
    ) -> Vec<RequiredDependency> {
        let names: Vec<String> = (0..self.content.len())
            .map(|i| instance_name(&dependency.name, self.separator, i))
            .collect();

        if names.is_empty() {
            for key in referencing_properties(&dependency.name, properties) {
                properties.insert(key, Value::Array(Vec::new()));
            }
            properties.insert(list.to_string(), Value::Array(Vec::new()));
            return Vec::new();
        }

        let mut expander = PropertiesExpander::new(dependency.name.as_str(), names.clone());
        let variants = expander.expand(properties);
        for key in expander.expanded_properties() {
            let values = variants
                .iter()
                .map(|variant| variant.get(key).cloned().unwrap_or(Value::Null))
                .collect();
            properties.insert(key.clone(), Value::Array(values));
        }

        let dependency_variants = PropertiesExpander::scoped(dependency.name.as_str(), names.clone())
            .expand(&dependency.properties);
        let instances: Vec<RequiredDependency> = names
            .iter()
            .zip(dependency_variants)
            .map(|(name, variant)| RequiredDependency {
                list: None,
                properties: variant,
                ..dependency.renamed(name.as_str())
            })
            .collect();

        let elements = instances
            .iter()
            .zip(self.content)
            .map(|(instance, content)| {
                if dependency.properties.is_empty() {
                    Value::Object(content.clone())
                } else {
                    Value::Object(qualify(&instance.name, &instance.properties))
                }
            })
            .collect();
        properties.insert(list.to_string(), Value::Array(elements));
        instances
    }
}

/// Rewrite the short references of a dependency's properties into fully
/// qualified ones, so they stay resolvable outside the dependency
fn qualify(dependency: &str, properties: &Properties) -> Properties {
    let scoped = ReferencePattern::scoped(dependency);
    let fully_qualified = ReferencePattern::FullyQualified;
    visit(properties, |_, text| {
        let (text, _) = scoped.replace(text, |reference| Some(fully_qualified.render(reference)));
        Value::String(text)
    })
}

/// Swap the filter resource for the resources carrying bound content
fn replace_resource(
    resources: &mut Vec<Resource>,
    original: &Resource,
    content: &[Properties],
    listed: bool,
    separator: &str,
) {
    let Some(position) = resources.iter().position(|r| r.name == original.name) else {
        return;
    };
    let bound = |name: String, content: &Properties| Resource {
        name,
        properties: content.clone(),
        ..original.clone()
    };

    let mut replacements = Vec::new();
    if let [single] = content {
        replacements.push(bound(original.name.clone(), single));
    }
    if listed {
        replacements.extend(
            content
                .iter()
                .enumerate()
                .map(|(i, content)| bound(instance_name(&original.name, separator, i), content)),
        );
    }
    resources.splice(position..=position, replacements);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_model::{CloudTarget, Module};
    use serde_json::json;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn config_resource() -> Resource {
        Resource::new("cfg", "configuration").with_parameters(props(json!({"provider-id": "shop:api"})))
    }

    fn entries(urls: &[&str]) -> MatchResult {
        MatchResult::from_entries(
            urls.iter()
                .map(|url| {
                    ConfigurationEntry::new("shop:api", CloudTarget::new("acme", "dev"))
                        .with_content(props(json!({ "url": url })))
                })
                .collect(),
        )
    }

    fn single_consumer(resource: Resource) -> DeploymentDescriptor {
        DeploymentDescriptor::new("consumer", "1.0.0")
            .with_module(
                Module::new("web", "nodejs")
                    .with_properties(props(json!({"api": "${cfg/url}/v1", "name": "web"})))
                    .requiring(RequiredDependency::new("cfg")),
            )
            .with_resource(resource)
    }

    fn list_consumer() -> DeploymentDescriptor {
        DeploymentDescriptor::new("consumer", "1.0.0")
            .with_module(
                Module::new("web", "nodejs")
                    .with_properties(props(json!({"endpoint": "${cfg/url}"})))
                    .requiring(
                        RequiredDependency::new("cfg")
                            .as_list("backends")
                            .with_properties(props(json!({"backend-url": "${url}"}))),
                    ),
            )
            .with_resource(config_resource())
    }

    fn inject(descriptor: &DeploymentDescriptor, result: MatchResult) -> Result<DeploymentDescriptor> {
        let matches = BTreeMap::from([("cfg".to_string(), result)]);
        inject_entries(descriptor, &matches, ".", &EscapeSequenceReplacer::default())
    }

    #[test]
    fn test_single_entry_replaces_resource() {
        let injected = inject(&single_consumer(config_resource()), entries(&["https://a"])).unwrap();
        let resource = injected.resource("cfg").unwrap();
        assert_eq!(resource.properties["url"], json!("https://a"));
        assert_eq!(resource.parameters["provider-id"], json!("shop:api"));
        assert_eq!(injected.modules[0].requires.len(), 1);
    }

    #[test]
    fn test_plain_dependency_needs_one_entry() {
        let descriptor = single_consumer(config_resource());
        assert!(matches!(
            inject(&descriptor, MatchResult::NoMatch).unwrap_err(),
            BindingError::NoMatch { .. }
        ));
        assert!(matches!(
            inject(&descriptor, entries(&["a", "b"])).unwrap_err(),
            BindingError::AmbiguousMatch { count: 2, .. }
        ));
        assert!(matches!(
            inject(&descriptor, MatchResult::Invalid("unresolved".into())).unwrap_err(),
            BindingError::InvalidFilter { .. }
        ));
    }

    #[test]
    fn test_optional_resource_without_entries_is_dropped() {
        let mut optional = config_resource();
        optional.optional = true;
        let injected = inject(&single_consumer(optional), MatchResult::NoMatch).unwrap();
        assert!(injected.resource("cfg").is_none());
        let web = &injected.modules[0];
        assert!(web.requires.is_empty());
        assert!(!web.properties.contains_key("api"));
        assert_eq!(web.properties["name"], json!("web"));
    }

    #[test]
    fn test_inactive_resource_is_removed() {
        let injected = inject(&single_consumer(config_resource().inactive()), entries(&["a"])).unwrap();
        assert!(injected.resource("cfg").is_none());
        assert!(injected.modules[0].requires.is_empty());
    }

    #[test]
    fn test_list_expansion() {
        let injected = inject(&list_consumer(), entries(&["https://a", "https://b"])).unwrap();
        let web = &injected.modules[0];

        let names: Vec<_> = web.requires.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["cfg.0", "cfg.1"]);
        assert!(web.requires.iter().all(|d| d.list.is_none()));
        assert_eq!(web.requires[1].properties["backend-url"], json!("${url}"));

        assert_eq!(web.properties["endpoint"], json!(["${cfg.0/url}", "${cfg.1/url}"]));
        assert_eq!(
            web.properties["backends"],
            json!([{"backend-url": "${cfg.0/url}"}, {"backend-url": "${cfg.1/url}"}])
        );

        assert!(injected.resource("cfg").is_none());
        assert_eq!(injected.resource("cfg.1").unwrap().properties["url"], json!("https://b"));
    }

    #[test]
    fn test_list_without_entries_is_empty() {
        let injected = inject(&list_consumer(), MatchResult::NoMatch).unwrap();
        let web = &injected.modules[0];
        assert!(web.requires.is_empty());
        assert_eq!(web.properties["backends"], json!([]));
        assert_eq!(web.properties["endpoint"], json!([]));
        assert!(injected.resources.is_empty());
    }

    #[test]
    fn test_list_without_dependency_properties_collects_content() {
        let mut descriptor = list_consumer();
        descriptor.modules[0].requires[0].properties = Properties::new();
        let injected = inject(&descriptor, entries(&["https://a"])).unwrap();
        assert_eq!(
            injected.modules[0].properties["backends"],
            json!([{"url": "https://a"}])
        );
        // a single entry still keeps the original resource for plain consumers
        assert!(injected.resource("cfg").is_some());
        assert!(injected.resource("cfg.0").is_some());
    }

    #[test]
    fn test_entry_content_is_escaped() {
        let injected = inject(&single_consumer(config_resource()), entries(&["${other/url}"])).unwrap();
        assert_eq!(
            injected.resource("cfg").unwrap().properties["url"],
            json!("\\${other/url}")
        );
    }
}
