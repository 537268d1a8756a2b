//! Configuration entries published to the shared registry

use crate::properties::Properties;
use crate::target::{CloudTarget, Visibility};
use serde::{Deserialize, Serialize};

/// Provider namespace id used for entries published by MTA deployments
pub const PROVIDER_NID_MTA: &str = "mta";

const PROVIDER_ID_DELIMITER: char = ':';

/// Registry-assigned entry identifier
pub type EntryId = u64;

/// A resource one deployed application publishes for others to consume.
///
/// Entries are superseded on redeploy rather than mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigurationEntry {
    /// Assigned by the registry on save; zero until then
    #[serde(default)]
    pub id: EntryId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_nid: Option<String>,

    pub provider_id: String,

    /// Entries without a version never satisfy a version-qualified filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_version: Option<semver::Version>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_namespace: Option<String>,

    /// The scope the entry was published from
    pub target: CloudTarget,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,

    #[serde(default)]
    pub content: Properties,

    /// Additional scopes allowed to see this entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Vec<Visibility>>,
}

impl ConfigurationEntry {
    pub fn new(provider_id: impl Into<String>, target: CloudTarget) -> Self {
        Self {
            id: 0,
            provider_nid: None,
            provider_id: provider_id.into(),
            provider_version: None,
            provider_namespace: None,
            target,
            space_id: None,
            content: Properties::new(),
            visibility: None,
        }
    }

    pub fn with_version(mut self, version: semver::Version) -> Self {
        self.provider_version = Some(version);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.provider_namespace = Some(namespace.into());
        self
    }

    pub fn with_content(mut self, content: Properties) -> Self {
        self.content = content;
        self
    }

    pub fn with_visibility(mut self, visibility: Vec<Visibility>) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Whether the entry has no (or an empty) namespace
    pub fn has_default_namespace(&self) -> bool {
        self.provider_namespace
            .as_deref()
            .map_or(true, str::is_empty)
    }

    /// Provider id of an entry published by an MTA for one provided dependency
    pub fn compute_provider_id(mta_id: &str, provided_dependency: &str) -> String {
        format!("{mta_id}{PROVIDER_ID_DELIMITER}{provided_dependency}")
    }
}
