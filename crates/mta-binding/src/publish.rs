//! Entry publishing
//!
//! Public provided dependencies of a deployed MTA become configuration
//! entries other MTAs can bind to.

use crate::error::Result;
use crate::visibility::{parse_visibility, VISIBILITY_PARAMETER};
use mta_model::{CloudTarget, ConfigurationEntry, DeploymentDescriptor, PROVIDER_NID_MTA};
use tracing::{debug, warn};

/// One entry per public provided dependency of `descriptor`, in declaration
/// order. Ids are left unassigned for the registry to fill in.
pub fn publish_entries(
    descriptor: &DeploymentDescriptor,
    target: &CloudTarget,
    space_id: Option<&str>,
) -> Result<Vec<ConfigurationEntry>> {
    let version = match semver::Version::parse(&descriptor.version) {
        Ok(version) => Some(version),
        Err(e) => {
            warn!(mta = %descriptor.id, version = %descriptor.version, error = %e, "Publishing entries without a version");
            None
        }
    };

    let mut entries = Vec::new();
    for module in &descriptor.modules {
        for provided in module.provides.iter().filter(|p| p.public) {
            let provider_id = ConfigurationEntry::compute_provider_id(&descriptor.id, &provided.name);
            let mut entry = ConfigurationEntry::new(provider_id.as_str(), target.clone())
                .with_content(provided.properties.clone());
            entry.provider_nid = Some(PROVIDER_NID_MTA.to_string());
            entry.provider_version = version.clone();
            entry.provider_namespace = descriptor.namespace.clone();
            entry.space_id = space_id.map(str::to_string);
            if let Some(value) = provided.parameters.get(VISIBILITY_PARAMETER) {
                entry.visibility = Some(parse_visibility(&provider_id, value)?);
            }
            debug!(provider = %provider_id, module = %module.name, "Publishing entry");
            entries.push(entry);
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindingError;
    use mta_model::{Module, ProvidedDependency, Properties, Visibility};
    use serde_json::{json, Value};

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn provider() -> DeploymentDescriptor {
        let mut descriptor = DeploymentDescriptor::new("com.acme.shop", "2.1.0").with_module(
            Module::new("backend", "java")
                .providing(
                    ProvidedDependency::new("api")
                        .public()
                        .with_properties(props(json!({"url": "https://shop.acme.io"})))
                        .with_parameters(props(json!({"visibility": [{"org": "partner"}]}))),
                )
                .providing(ProvidedDependency::new("internal")),
        );
        descriptor.namespace = Some("blue".to_string());
        descriptor
    }

    #[test]
    fn test_publishes_public_dependencies() {
        let target = CloudTarget::new("acme", "dev");
        let entries = publish_entries(&provider(), &target, Some("space-guid")).unwrap();
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.id, 0);
        assert_eq!(entry.provider_id, "com.acme.shop:api");
        assert_eq!(entry.provider_nid.as_deref(), Some(PROVIDER_NID_MTA));
        assert_eq!(entry.provider_version, Some(semver::Version::new(2, 1, 0)));
        assert_eq!(entry.provider_namespace.as_deref(), Some("blue"));
        assert_eq!(entry.target, target);
        assert_eq!(entry.space_id.as_deref(), Some("space-guid"));
        assert_eq!(entry.content["url"], json!("https://shop.acme.io"));
        assert_eq!(entry.visibility, Some(vec![Visibility::org("partner")]));
    }

    #[test]
    fn test_unparsable_version_is_omitted() {
        let mut descriptor = provider();
        descriptor.version = "latest".to_string();
        let entries = publish_entries(&descriptor, &CloudTarget::new("acme", "dev"), None).unwrap();
        assert!(entries[0].provider_version.is_none());
        assert!(entries[0].space_id.is_none());
    }

    #[test]
    fn test_invalid_visibility_is_rejected() {
        let descriptor = DeploymentDescriptor::new("shop", "1.0.0").with_module(
            Module::new("backend", "java").providing(
                ProvidedDependency::new("api")
                    .public()
                    .with_parameters(props(json!({"visibility": {"org": "acme"}}))),
            ),
        );
        let err = publish_entries(&descriptor, &CloudTarget::new("acme", "dev"), None).unwrap_err();
        assert!(matches!(err, BindingError::InvalidVisibilityDeclaration { .. }));
    }
}
