//! Configuration filter declarations
//!
//! Two resource types declare filters. `configuration` resources name the
//! provider directly; legacy `mta-provided` resources name another MTA and
//! one of its provided dependencies.

use crate::error::{BindingError, Result};
use crate::version::VersionEvaluator;
use mta_model::properties::get_str;
use mta_model::{
    CloudTarget, ConfigurationEntry, ConfigurationFilter, Properties, Resource, PROVIDER_NID_MTA,
};
use mta_resolver::ReferencePattern;
use serde_json::Value;
use std::sync::Arc;

pub const RESOURCE_TYPE_CONFIGURATION: &str = "configuration";
pub const RESOURCE_TYPE_MTA_PROVIDED: &str = "mta-provided";

pub const PARAM_PROVIDER_NID: &str = "provider-nid";
pub const PARAM_PROVIDER_ID: &str = "provider-id";
pub const PARAM_VERSION: &str = "version";
pub const PARAM_NAMESPACE: &str = "provider-namespace";
pub const PARAM_TARGET: &str = "target";
pub const PARAM_FILTER: &str = "filter";

pub const PARAM_MTA_ID: &str = "mta-id";
pub const PARAM_MTA_VERSION: &str = "mta-version";
pub const PARAM_MTA_PROVIDED_DEPENDENCY: &str = "mta-provides-dependency";

/// Builds [`ConfigurationFilter`]s from descriptor resources
#[derive(Clone)]
pub struct ConfigurationFilterParser {
    evaluator: Arc<dyn VersionEvaluator>,
    current_target: CloudTarget,
    global_target: Option<CloudTarget>,
}

impl ConfigurationFilterParser {
    /// Parser for a deployment into `current_target`
    pub fn new(current_target: CloudTarget, evaluator: Arc<dyn VersionEvaluator>) -> Self {
        Self {
            evaluator,
            current_target,
            global_target: None,
        }
    }

    /// Fall back to this space of the current org when a filter finds nothing
    pub fn with_global_space(mut self, space: impl Into<String>) -> Self {
        self.global_target = Some(CloudTarget::new(self.current_target.org.clone(), space));
        self
    }

    pub fn global_target(&self) -> Option<&CloudTarget> {
        self.global_target.as_ref()
    }

    /// Whether a resource declares a configuration filter
    pub fn is_filter_resource(resource: &Resource) -> bool {
        matches!(
            resource.resource_type.as_str(),
            RESOURCE_TYPE_CONFIGURATION | RESOURCE_TYPE_MTA_PROVIDED
        )
    }

    /// Filter declared by `resource`, or `None` for ordinary resources
    pub fn parse(&self, resource: &Resource) -> Result<Option<ConfigurationFilter>> {
        if !Self::is_filter_resource(resource) {
            return Ok(None);
        }
        ensure_resolved(resource)?;
        let filter = match resource.resource_type.as_str() {
            RESOURCE_TYPE_MTA_PROVIDED => self.parse_mta_provided(resource)?,
            _ => self.parse_configuration(resource)?,
        };
        Ok(Some(filter))
    }

    fn parse_configuration(&self, resource: &Resource) -> Result<ConfigurationFilter> {
        let parameters = &resource.parameters;
        let provider_id = required_str(resource, PARAM_PROVIDER_ID)?;
        let (target, strict) = match parameters.get(PARAM_TARGET) {
            Some(value) => (parse_target(resource, value)?, true),
            None => (self.current_target.clone(), false),
        };

        let mut filter = ConfigurationFilter::new(provider_id, target);
        filter.strict_target = strict;
        filter.provider_nid = optional_str(resource, PARAM_PROVIDER_NID)?;
        filter.provider_namespace = optional_str(resource, PARAM_NAMESPACE)?;
        if let Some(version) = optional_str(resource, PARAM_VERSION)? {
            filter.version_requirement = Some(self.evaluator.parse_requirement(&version)?);
        }
        if let Some(content) = parameters.get(PARAM_FILTER) {
            let content = content.as_object().ok_or_else(|| {
                invalid(resource, format!("\"{PARAM_FILTER}\" must be a map"))
            })?;
            filter.required_content = Some(content.clone());
        }
        Ok(filter)
    }

    fn parse_mta_provided(&self, resource: &Resource) -> Result<ConfigurationFilter> {
        let mta_id = required_str(resource, PARAM_MTA_ID)?;
        let dependency = required_str(resource, PARAM_MTA_PROVIDED_DEPENDENCY)?;
        let version = required_str(resource, PARAM_MTA_VERSION)?;

        let mut filter = ConfigurationFilter::new(
            ConfigurationEntry::compute_provider_id(&mta_id, &dependency),
            self.current_target.clone(),
        )
        .with_version(self.evaluator.parse_requirement(&version)?);
        filter.provider_nid = Some(PROVIDER_NID_MTA.to_string());
        Ok(filter)
    }
}

fn invalid(resource: &Resource, reason: String) -> BindingError {
    BindingError::InvalidFilter {
        resource: resource.name.clone(),
        reason,
    }
}

fn ensure_resolved(resource: &Resource) -> Result<()> {
    let pattern = ReferencePattern::FullyQualified;
    let unresolved = mta_resolver::visitor::try_visit(&resource.parameters, &mut |key, text| {
        match pattern.matches(text).next() {
            Some(found) => Err(format!(
                "parameter \"{key}\" contains the unresolved reference {}",
                found.reference
            )),
            None => Ok(Value::Null),
        }
    });
    unresolved.map(|_| ()).map_err(|reason| invalid(resource, reason))
}

fn required_str(resource: &Resource, key: &str) -> Result<String> {
    optional_str(resource, key)?
        .ok_or_else(|| invalid(resource, format!("missing parameter \"{key}\"")))
}

fn optional_str(resource: &Resource, key: &str) -> Result<Option<String>> {
    match resource.parameters.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(invalid(
            resource,
            format!("parameter \"{key}\" must be a string, got {other}"),
        )),
    }
}

/// A target is either `"<org> <space>"` text or an `{org, space}` map
fn parse_target(resource: &Resource, value: &Value) -> Result<CloudTarget> {
    match value {
        Value::String(text) => {
            CloudTarget::parse(text).map_err(|e| invalid(resource, e.to_string()))
        }
        Value::Object(map) => target_from_map(map)
            .ok_or_else(|| invalid(resource, format!("target needs \"org\" and \"space\": {value}"))),
        other => Err(invalid(resource, format!("malformed target {other}"))),
    }
}

fn target_from_map(map: &Properties) -> Option<CloudTarget> {
    Some(CloudTarget::new(get_str(map, "org")?, get_str(map, "space")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::SemverEvaluator;
    use serde_json::json;

    fn parser() -> ConfigurationFilterParser {
        ConfigurationFilterParser::new(CloudTarget::new("acme", "dev"), Arc::new(SemverEvaluator))
            .with_global_space("shared")
    }

    fn resource(resource_type: &str, parameters: Value) -> Resource {
        Resource::new("cfg", resource_type)
            .with_parameters(parameters.as_object().cloned().unwrap())
    }

    #[test]
    fn test_configuration_resource() {
        let filter = parser()
            .parse(&resource(
                RESOURCE_TYPE_CONFIGURATION,
                json!({
                    "provider-nid": "mta",
                    "provider-id": "shop:api",
                    "version": ">=1.0.0",
                    "provider-namespace": "blue",
                    "filter": {"type": "rest"}
                }),
            ))
            .unwrap()
            .unwrap();

        assert_eq!(filter.provider_id, "shop:api");
        assert_eq!(filter.provider_nid.as_deref(), Some("mta"));
        assert_eq!(filter.provider_namespace.as_deref(), Some("blue"));
        assert_eq!(filter.target, CloudTarget::new("acme", "dev"));
        assert!(!filter.strict_target);
        assert_eq!(filter.required_content.unwrap()["type"], json!("rest"));
        assert_eq!(filter.version_requirement.unwrap().as_str(), ">=1.0.0");
    }

    #[test]
    fn test_explicit_target_is_strict() {
        let parser = parser();
        for target in [json!("partner prod"), json!({"org": "partner", "space": "prod"})] {
            let filter = parser
                .parse(&resource(
                    RESOURCE_TYPE_CONFIGURATION,
                    json!({"provider-id": "p", "target": target}),
                ))
                .unwrap()
                .unwrap();
            assert_eq!(filter.target, CloudTarget::new("partner", "prod"));
            assert!(filter.strict_target);
        }
        assert_eq!(
            parser.global_target(),
            Some(&CloudTarget::new("acme", "shared"))
        );
    }

    #[test]
    fn test_mta_provided_resource() {
        let filter = parser()
            .parse(&resource(
                RESOURCE_TYPE_MTA_PROVIDED,
                json!({
                    "mta-id": "com.acme.shop",
                    "mta-version": "2.1.0",
                    "mta-provides-dependency": "api"
                }),
            ))
            .unwrap()
            .unwrap();
        assert_eq!(filter.provider_id, "com.acme.shop:api");
        assert_eq!(filter.provider_nid.as_deref(), Some(PROVIDER_NID_MTA));
        assert!(filter
            .version_requirement
            .unwrap()
            .satisfied_by(&semver::Version::new(2, 1, 0)));
    }

    #[test]
    fn test_ordinary_resource_has_no_filter() {
        let parsed = parser()
            .parse(&resource("postgres", json!({"provider-id": "p"})))
            .unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_invalid_declarations() {
        let parser = parser();
        for parameters in [
            json!({}),
            json!({"provider-id": 5.5, "target": "one"}),
            json!({"provider-id": "p", "target": "only-one-token"}),
            json!({"provider-id": "p", "target": {"org": "a"}}),
            json!({"provider-id": "p", "filter": "text"}),
            json!({"provider-id": "${other/id}"}),
        ] {
            let err = parser
                .parse(&resource(RESOURCE_TYPE_CONFIGURATION, parameters.clone()))
                .unwrap_err();
            assert!(
                matches!(err, BindingError::InvalidFilter { .. }),
                "{parameters} should be rejected"
            );
        }
    }
}
