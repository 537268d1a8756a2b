//! Configuration subscriptions
//!
//! A subscription records that a module of a deployed MTA is bound to
//! entries selected by a filter, so the binding can be re-evaluated when the
//! registry changes.

use crate::descriptor::{Module, ProvidedDependency, RequiredDependency, Resource};
use crate::filter::ConfigurationFilter;
use crate::properties::Properties;
use serde::{Deserialize, Serialize};

/// Store-assigned subscription identifier
pub type SubscriptionId = u64;

/// Durable binding of consumer, filter and space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigurationSubscription {
    #[serde(default)]
    pub id: SubscriptionId,
    pub mta_id: String,
    pub app_name: String,
    pub resource_name: String,
    pub space_id: String,
    pub filter: ConfigurationFilter,
    pub module: ModuleSnapshot,
    pub resource: ResourceSnapshot,
}

impl ConfigurationSubscription {
    pub fn new(
        mta_id: impl Into<String>,
        space_id: impl Into<String>,
        app_name: impl Into<String>,
        filter: ConfigurationFilter,
        module: &Module,
        resource: &Resource,
    ) -> Self {
        Self {
            id: 0,
            mta_id: mta_id.into(),
            app_name: app_name.into(),
            resource_name: resource.name.clone(),
            space_id: space_id.into(),
            filter,
            module: ModuleSnapshot::from_module(module, &resource.name),
            resource: ResourceSnapshot::from(resource),
        }
    }
}

/// The parts of a consuming module needed to re-bind it later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModuleSnapshot {
    pub name: String,
    #[serde(default)]
    pub properties: Properties,
    /// Only the dependency on the subscribed resource
    #[serde(default)]
    pub requires: Vec<RequiredDependency>,
    #[serde(default)]
    pub provides: Vec<ProvidedDependency>,
}

impl ModuleSnapshot {
    pub fn from_module(module: &Module, resource_name: &str) -> Self {
        Self {
            name: module.name.clone(),
            properties: module.properties.clone(),
            requires: module
                .requires
                .iter()
                .filter(|dependency| dependency.name == resource_name)
                .cloned()
                .collect(),
            provides: module.provides.clone(),
        }
    }
}

/// The subscribed resource as declared by the consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceSnapshot {
    pub name: String,
    #[serde(rename = "type", default)]
    pub resource_type: String,
    #[serde(default)]
    pub parameters: Properties,
    #[serde(default)]
    pub properties: Properties,
}

impl From<&Resource> for ResourceSnapshot {
    fn from(resource: &Resource) -> Self {
        Self {
            name: resource.name.clone(),
            resource_type: resource.resource_type.clone(),
            parameters: resource.parameters.clone(),
            properties: resource.properties.clone(),
        }
    }
}
