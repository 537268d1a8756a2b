//! Deployment descriptors
//!
//! The canonical, schema-independent shape every resolver operates on.

use crate::error::{ModelError, Result};
use crate::properties::{Properties, PropertyTypes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Root of one MTA deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeploymentDescriptor {
    pub schema_version: String,
    pub id: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default)]
    pub parameters: Properties,

    #[serde(default)]
    pub modules: Vec<Module>,

    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl DeploymentDescriptor {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            schema_version: "3.3".to_string(),
            id: id.into(),
            version: version.into(),
            namespace: None,
            parameters: Properties::new(),
            modules: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn with_module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Check that names are unique where they are looked up: module,
    /// resource and provided dependency names across the descriptor, and
    /// required dependency names within their owner.
    pub fn validate(&self) -> Result<()> {
        unique_names("module", &self.id, self.modules.iter().map(|m| &m.name))?;
        unique_names("resource", &self.id, self.resources.iter().map(|r| &r.name))?;
        unique_names(
            "provided dependency",
            &self.id,
            self.modules.iter().flat_map(|m| &m.provides).map(|p| &p.name),
        )?;
        for module in &self.modules {
            unique_names(
                "required dependency",
                &module.name,
                module.requires.iter().map(|d| &d.name),
            )?;
        }
        for resource in &self.resources {
            unique_names(
                "required dependency",
                &resource.name,
                resource.requires.iter().map(|d| &d.name),
            )?;
        }
        Ok(())
    }

    /// Find a provided dependency by its descriptor-global name
    pub fn provided_dependency(&self, name: &str) -> Option<(&Module, &ProvidedDependency)> {
        self.modules.iter().find_map(|module| {
            module
                .provides
                .iter()
                .find(|p| p.name == name)
                .map(|provided| (module, provided))
        })
    }
}

/// A deployable unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Module {
    pub name: String,

    #[serde(rename = "type", default)]
    pub module_type: String,

    #[serde(default)]
    pub parameters: Properties,

    #[serde(default)]
    pub properties: Properties,

    #[serde(default, skip_serializing_if = "PropertyTypes::is_empty")]
    pub property_types: PropertyTypes,

    #[serde(default)]
    pub requires: Vec<RequiredDependency>,

    #[serde(default)]
    pub provides: Vec<ProvidedDependency>,
}

impl Module {
    pub fn new(name: impl Into<String>, module_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module_type: module_type.into(),
            parameters: Properties::new(),
            properties: Properties::new(),
            property_types: PropertyTypes::new(),
            requires: Vec::new(),
            provides: Vec::new(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_parameters(mut self, parameters: Properties) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn requiring(mut self, dependency: RequiredDependency) -> Self {
        self.requires.push(dependency);
        self
    }

    pub fn providing(mut self, dependency: ProvidedDependency) -> Self {
        self.provides.push(dependency);
        self
    }
}

/// A service, binding or externally-bound configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Resource {
    pub name: String,

    #[serde(rename = "type", default)]
    pub resource_type: String,

    /// Inactive resources are skipped by binding entirely
    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub optional: bool,

    #[serde(default)]
    pub parameters: Properties,

    #[serde(default)]
    pub properties: Properties,

    #[serde(default, skip_serializing_if = "PropertyTypes::is_empty")]
    pub property_types: PropertyTypes,

    #[serde(default)]
    pub requires: Vec<RequiredDependency>,
}

impl Resource {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            active: true,
            optional: false,
            parameters: Properties::new(),
            properties: Properties::new(),
            property_types: PropertyTypes::new(),
            requires: Vec::new(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_parameters(mut self, parameters: Properties) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// A named pointer to a provided dependency or a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RequiredDependency {
    pub name: String,

    /// Collects every bound instance into this property as a list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<String>,

    #[serde(default)]
    pub parameters: Properties,

    #[serde(default)]
    pub properties: Properties,
}

impl RequiredDependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            list: None,
            parameters: Properties::new(),
            properties: Properties::new(),
        }
    }

    pub fn as_list(mut self, list: impl Into<String>) -> Self {
        self.list = Some(list.into());
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// The same dependency pointing at a different name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// A publicly referenceable bundle of module properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProvidedDependency {
    pub name: String,

    /// Public dependencies are published as configuration entries
    #[serde(default)]
    pub public: bool,

    #[serde(default)]
    pub parameters: Properties,

    #[serde(default)]
    pub properties: Properties,
}

impl ProvidedDependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            public: false,
            parameters: Properties::new(),
            properties: Properties::new(),
        }
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_parameters(mut self, parameters: Properties) -> Self {
        self.parameters = parameters;
        self
    }
}

fn default_true() -> bool {
    true
}

fn unique_names<'a>(
    kind: &'static str,
    scope: &str,
    names: impl Iterator<Item = &'a String>,
) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ModelError::DuplicateName {
                kind,
                name: name.clone(),
                scope: scope.to_string(),
            });
        }
    }
    Ok(())
}
