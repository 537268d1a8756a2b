//! Filter matching
//!
//! Decides which published entries satisfy a consumer's filter. Matching is
//! a pure predicate over an entry snapshot; nothing is ranked.

use crate::error::{BindingError, Result};
use crate::parser::ConfigurationFilterParser;
use crate::version::{SemverEvaluator, VersionEvaluator};
use mta_model::properties::to_text;
use mta_model::{
    CloudTarget, ConfigurationEntry, ConfigurationFilter, DeploymentDescriptor,
    DEFAULT_NAMESPACE_KEYWORD,
};
use mta_resolver::visitor::visit;
use mta_resolver::ReferencePattern;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of matching one filter against a snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Matched(Vec<ConfigurationEntry>),
    NoMatch,
    /// The filter cannot be evaluated yet, or is malformed
    Invalid(String),
}

impl MatchResult {
    pub fn from_entries(entries: Vec<ConfigurationEntry>) -> Self {
        if entries.is_empty() {
            MatchResult::NoMatch
        } else {
            MatchResult::Matched(entries)
        }
    }

    pub fn entries(&self) -> &[ConfigurationEntry] {
        match self {
            MatchResult::Matched(entries) => entries,
            _ => &[],
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched(_))
    }
}

/// Evaluates filters against configuration entries
#[derive(Clone)]
pub struct ConfigurationFilterMatcher {
    evaluator: Arc<dyn VersionEvaluator>,
}

impl ConfigurationFilterMatcher {
    pub fn new(evaluator: Arc<dyn VersionEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Whether `entry` satisfies every criterion of `filter`
    pub fn matches(&self, entry: &ConfigurationEntry, filter: &ConfigurationFilter) -> bool {
        entry.provider_id == filter.provider_id
            && filter
                .provider_nid
                .as_ref()
                .map_or(true, |nid| entry.provider_nid.as_ref() == Some(nid))
            && self.version_matches(entry, filter)
            && namespace_matches(entry, filter)
            && target_matches(entry, &filter.target)
            && content_matches(entry, filter)
    }

    /// Entries of `entries` matching `filter`, in their original order
    pub fn find_matches(
        &self,
        filter: &ConfigurationFilter,
        entries: &[ConfigurationEntry],
    ) -> MatchResult {
        if let Some(reason) = unresolved_reference(filter) {
            return MatchResult::Invalid(reason);
        }
        MatchResult::from_entries(
            entries
                .iter()
                .filter(|entry| self.matches(entry, filter))
                .cloned()
                .collect(),
        )
    }

    /// Match every active filter resource of `descriptor` against `snapshot`.
    ///
    /// A non-strict filter without matches is retried against the global
    /// configuration space, where an absent namespace means the default one.
    /// Malformed filters yield [`MatchResult::Invalid`]. An invalid version
    /// requirement fails the whole match, optional resource or not.
    pub fn match_filters(
        &self,
        parser: &ConfigurationFilterParser,
        descriptor: &DeploymentDescriptor,
        snapshot: &[ConfigurationEntry],
    ) -> Result<BTreeMap<String, MatchResult>> {
        let mut results = BTreeMap::new();
        for resource in &descriptor.resources {
            if !resource.active {
                if ConfigurationFilterParser::is_filter_resource(resource) {
                    warn!(resource = %resource.name, "Skipping inactive configuration resource");
                }
                continue;
            }
            let result = match parser.parse(resource) {
                Ok(Some(filter)) => self.find_with_fallback(&filter, parser.global_target(), snapshot),
                Ok(None) => continue,
                Err(e @ BindingError::Model(_)) => return Err(e),
                Err(e) => MatchResult::Invalid(e.to_string()),
            };
            debug!(
                resource = %resource.name,
                matched = result.entries().len(),
                invalid = matches!(result, MatchResult::Invalid(_)),
                "Matched configuration filter"
            );
            results.insert(resource.name.clone(), result);
        }
        Ok(results)
    }

    fn find_with_fallback(
        &self,
        filter: &ConfigurationFilter,
        global_target: Option<&CloudTarget>,
        snapshot: &[ConfigurationEntry],
    ) -> MatchResult {
        let result = self.find_matches(filter, snapshot);
        let global = match global_target {
            Some(global) if result == MatchResult::NoMatch && !filter.strict_target => global,
            _ => return result,
        };
        if *global == filter.target {
            return result;
        }

        let mut fallback = filter.retarget(global.clone());
        if fallback.provider_namespace.is_none() {
            fallback.provider_namespace = Some(DEFAULT_NAMESPACE_KEYWORD.to_string());
        }
        debug!(provider = %filter.provider_id, target = %global, "Searching global configuration space");
        self.find_matches(&fallback, snapshot)
    }

    fn version_matches(&self, entry: &ConfigurationEntry, filter: &ConfigurationFilter) -> bool {
        match (&filter.version_requirement, &entry.provider_version) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(requirement), Some(version)) => self.evaluator.satisfies(version, requirement),
        }
    }
}

impl Default for ConfigurationFilterMatcher {
    fn default() -> Self {
        Self::new(Arc::new(SemverEvaluator))
    }
}

fn namespace_matches(entry: &ConfigurationEntry, filter: &ConfigurationFilter) -> bool {
    if filter.requires_default_namespace() {
        return entry.has_default_namespace();
    }
    filter
        .provider_namespace
        .as_deref()
        .map_or(true, |namespace| entry.provider_namespace.as_deref() == Some(namespace))
}

/// The entry was published to the target, or made visible to it
fn target_matches(entry: &ConfigurationEntry, target: &CloudTarget) -> bool {
    target.covers(&entry.target)
        || entry
            .visibility
            .iter()
            .flatten()
            .any(|visibility| visibility.covers(target))
}

fn content_matches(entry: &ConfigurationEntry, filter: &ConfigurationFilter) -> bool {
    filter.required_content.iter().flatten().all(|(key, expected)| {
        entry
            .content
            .get(key)
            .is_some_and(|actual| actual == expected || to_text(actual) == to_text(expected))
    })
}

/// Description of the first unresolved reference left in a filter
fn unresolved_reference(filter: &ConfigurationFilter) -> Option<String> {
    let pattern = ReferencePattern::FullyQualified;
    let fields = [
        ("provider-id", Some(filter.provider_id.as_str())),
        ("provider-nid", filter.provider_nid.as_deref()),
        ("provider-namespace", filter.provider_namespace.as_deref()),
        ("target", Some(filter.target.org.as_str())),
        ("target", Some(filter.target.space.as_str())),
    ];
    let mut found = fields.iter().find_map(|(field, value)| {
        let reference = pattern.matches((*value)?).next()?;
        Some(format!("{field} contains the unresolved reference {}", reference.reference))
    });

    if found.is_none() {
        if let Some(content) = &filter.required_content {
            visit(content, |key, text| {
                if found.is_none() {
                    if let Some(reference) = pattern.matches(text).next() {
                        found = Some(format!(
                            "required content \"{key}\" contains the unresolved reference {}",
                            reference.reference
                        ));
                    }
                }
                Value::Null
            });
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use mta_model::{Properties, Resource, VersionRequirement, Visibility, WILDCARD};
    use serde_json::json;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn entry(version: &str) -> ConfigurationEntry {
        ConfigurationEntry::new("shop:api", CloudTarget::new("acme", "dev"))
            .with_version(semver::Version::parse(version).unwrap())
    }

    fn filter() -> ConfigurationFilter {
        ConfigurationFilter::new("shop:api", CloudTarget::new("acme", "dev"))
    }

    #[test]
    fn test_version_requirement() {
        let matcher = ConfigurationFilterMatcher::default();
        let ranged = filter().with_version(VersionRequirement::parse(">=2.0.0 <3.0.0").unwrap());
        assert!(matcher.matches(&entry("2.4.0"), &ranged));
        assert!(!matcher.matches(&entry("3.0.0"), &ranged));
        assert!(!matcher.matches(&entry("1.0.0"), &ranged));

        let unversioned = ConfigurationEntry::new("shop:api", CloudTarget::new("acme", "dev"));
        assert!(!matcher.matches(&unversioned, &ranged));
        assert!(matcher.matches(&unversioned, &filter()));
    }

    #[test]
    fn test_default_namespace_keyword() {
        let matcher = ConfigurationFilterMatcher::default();
        let default_ns = filter().with_namespace(DEFAULT_NAMESPACE_KEYWORD);
        assert!(matcher.matches(&entry("1.0.0"), &default_ns));
        assert!(matcher.matches(&entry("1.0.0").with_namespace(""), &default_ns));
        assert!(!matcher.matches(&entry("1.0.0").with_namespace("blue"), &default_ns));

        let blue = filter().with_namespace("blue");
        assert!(matcher.matches(&entry("1.0.0").with_namespace("blue"), &blue));
        assert!(!matcher.matches(&entry("1.0.0"), &blue));

        assert!(matcher.matches(&entry("1.0.0").with_namespace("green"), &filter()));
    }

    #[test]
    fn test_target_wildcards_and_visibility() {
        let matcher = ConfigurationFilterMatcher::default();
        let elsewhere = ConfigurationEntry::new("shop:api", CloudTarget::new("acme", "prod"));
        assert!(!matcher.matches(&elsewhere, &filter()));

        let any_space = ConfigurationFilter::new("shop:api", CloudTarget::new("acme", WILDCARD));
        assert!(matcher.matches(&elsewhere, &any_space));

        let shared_with_org = elsewhere.clone().with_visibility(vec![Visibility::org("acme")]);
        assert!(matcher.matches(&shared_with_org, &filter()));

        let shared_with_space = elsewhere
            .clone()
            .with_visibility(vec![Visibility::space("acme", "test")]);
        assert!(!matcher.matches(&shared_with_space, &filter()));
    }

    #[test]
    fn test_provider_and_content() {
        let matcher = ConfigurationFilterMatcher::default();
        let rest = entry("1.0.0").with_content(props(json!({"type": "rest", "port": 80})));

        assert!(!matcher.matches(&rest, &ConfigurationFilter::new("other", CloudTarget::new("acme", "dev"))));

        let mut by_nid = filter();
        by_nid.provider_nid = Some("mta".into());
        assert!(!matcher.matches(&rest, &by_nid));

        assert!(matcher.matches(&rest, &filter().with_required_content(props(json!({"type": "rest"})))));
        assert!(matcher.matches(&rest, &filter().with_required_content(props(json!({"port": "80"})))));
        assert!(!matcher.matches(&rest, &filter().with_required_content(props(json!({"type": "soap"})))));
        assert!(!matcher.matches(&rest, &filter().with_required_content(props(json!({"missing": 1})))));
    }

    #[test]
    fn test_find_matches() {
        let matcher = ConfigurationFilterMatcher::default();
        let entries = vec![entry("1.0.0"), entry("2.0.0")];
        assert_eq!(matcher.find_matches(&filter(), &entries).entries().len(), 2);

        let none = filter().with_namespace("blue");
        assert_eq!(matcher.find_matches(&none, &entries), MatchResult::NoMatch);

        let unresolved = ConfigurationFilter::new("${partner/id}", CloudTarget::new("acme", "dev"));
        assert!(matches!(
            matcher.find_matches(&unresolved, &entries),
            MatchResult::Invalid(_)
        ));
        let unresolved = filter().with_required_content(props(json!({"k": "${a/b}"})));
        assert!(matches!(
            matcher.find_matches(&unresolved, &entries),
            MatchResult::Invalid(_)
        ));
    }

    #[test]
    fn test_match_filters_with_global_fallback() {
        let matcher = ConfigurationFilterMatcher::default();
        let parser = ConfigurationFilterParser::new(
            CloudTarget::new("acme", "dev"),
            Arc::new(SemverEvaluator),
        )
        .with_global_space("shared");

        let shared = ConfigurationEntry::new("global:cfg", CloudTarget::new("acme", "shared"));
        let descriptor = DeploymentDescriptor::new("consumer", "1.0.0")
            .with_resource(
                Resource::new("fallback", "configuration")
                    .with_parameters(props(json!({"provider-id": "global:cfg"}))),
            )
            .with_resource(
                Resource::new("strict", "configuration").with_parameters(props(json!({
                    "provider-id": "global:cfg",
                    "target": "acme dev"
                }))),
            )
            .with_resource(
                Resource::new("broken", "configuration").with_parameters(props(json!({}))),
            )
            .with_resource(
                Resource::new("off", "configuration")
                    .with_parameters(props(json!({"provider-id": "global:cfg"})))
                    .inactive(),
            )
            .with_resource(Resource::new("db", "postgres"));

        let results = matcher.match_filters(&parser, &descriptor, &[shared]).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results["fallback"].is_matched());
        assert_eq!(results["strict"], MatchResult::NoMatch);
        assert!(matches!(results["broken"], MatchResult::Invalid(_)));
        assert!(!results.contains_key("off"));
        assert!(!results.contains_key("db"));
    }

    #[test]
    fn test_invalid_version_requirement_is_fatal() {
        let matcher = ConfigurationFilterMatcher::default();
        let parser = ConfigurationFilterParser::new(
            CloudTarget::new("acme", "dev"),
            Arc::new(SemverEvaluator),
        );
        let mut resource = Resource::new("cfg", "configuration").with_parameters(props(json!({
            "provider-id": "shop:api",
            "version": "not a version"
        })));
        resource.optional = true;
        let descriptor = DeploymentDescriptor::new("consumer", "1.0.0").with_resource(resource);

        let err = matcher.match_filters(&parser, &descriptor, &[]).unwrap_err();
        assert!(matches!(
            err,
            BindingError::Model(mta_model::ModelError::InvalidVersionRequirement { .. })
        ));
    }
}
