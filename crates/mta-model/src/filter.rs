//! Consumer-side configuration filters

use crate::properties::Properties;
use crate::target::CloudTarget;
use crate::version::VersionRequirement;
use serde::{Deserialize, Serialize};

/// Namespace keyword that selects entries published without a namespace
pub const DEFAULT_NAMESPACE_KEYWORD: &str = "default";

/// Search criteria a required resource uses to find published entries.
///
/// Never persisted on its own; it is embedded in a descriptor resource or
/// copied into a [`ConfigurationSubscription`](crate::ConfigurationSubscription).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigurationFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_nid: Option<String>,

    pub provider_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_requirement: Option<VersionRequirement>,

    /// `None` matches any namespace; the default keyword matches none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_namespace: Option<String>,

    pub target: CloudTarget,

    /// The target was declared explicitly and must not fall back
    #[serde(default)]
    pub strict_target: bool,

    /// Key/value pairs every matching entry's content must carry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_content: Option<Properties>,
}

impl ConfigurationFilter {
    pub fn new(provider_id: impl Into<String>, target: CloudTarget) -> Self {
        Self {
            provider_nid: None,
            provider_id: provider_id.into(),
            version_requirement: None,
            provider_namespace: None,
            target,
            strict_target: false,
            required_content: None,
        }
    }

    pub fn with_version(mut self, requirement: VersionRequirement) -> Self {
        self.version_requirement = Some(requirement);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.provider_namespace = Some(namespace.into());
        self
    }

    pub fn with_required_content(mut self, content: Properties) -> Self {
        self.required_content = Some(content);
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict_target = true;
        self
    }

    /// Whether the filter asks for entries without a namespace
    pub fn requires_default_namespace(&self) -> bool {
        self.provider_namespace.as_deref() == Some(DEFAULT_NAMESPACE_KEYWORD)
    }

    /// The same filter retargeted to another scope
    pub fn retarget(&self, target: CloudTarget) -> Self {
        Self {
            target,
            ..self.clone()
        }
    }
}
