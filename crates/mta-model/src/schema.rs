//! Versioned descriptor parsing
//!
//! Descriptor documents exist in several schema major versions. This module
//! is the only place that knows about them: documents are parsed into
//! version-specific raw shapes and normalized into the canonical
//! [`DeploymentDescriptor`].

use crate::descriptor::{
    DeploymentDescriptor, Module, ProvidedDependency, RequiredDependency, Resource,
};
use crate::error::{ModelError, Result};
use crate::parameter::ParameterType;
use crate::properties::{Properties, PropertyTypes};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Supported descriptor schema major versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    /// No resource activation, metadata or resource dependencies
    V2,
    V3,
}

impl SchemaVersion {
    pub fn parse(text: &str) -> Result<Self> {
        let major = text.trim().split('.').next().unwrap_or_default();
        match major {
            "2" => Ok(SchemaVersion::V2),
            "3" => Ok(SchemaVersion::V3),
            _ => Err(ModelError::UnsupportedSchemaVersion(text.to_string())),
        }
    }
}

/// Parses descriptor documents into the canonical model
pub struct DescriptorParser;

impl DescriptorParser {
    pub fn from_yaml_str(text: &str) -> Result<DeploymentDescriptor> {
        let value: Value = serde_yaml::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_json_str(text: &str) -> Result<DeploymentDescriptor> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<DeploymentDescriptor> {
        let raw: RawDescriptor = serde_json::from_value(value)?;
        let schema_version = scalar_text(&raw.schema_version)
            .ok_or_else(|| ModelError::Schema("missing _schema-version".into()))?;
        let version = SchemaVersion::parse(&schema_version)?;
        debug!(id = %raw.id, schema = %schema_version, "Parsing deployment descriptor");

        let modules = raw
            .modules
            .into_iter()
            .map(|m| normalize_module(m, version))
            .collect::<Result<Vec<_>>>()?;
        let resources = raw
            .resources
            .into_iter()
            .map(|r| normalize_resource(r, version))
            .collect::<Result<Vec<_>>>()?;

        let descriptor = DeploymentDescriptor {
            schema_version,
            id: raw.id,
            version: scalar_text(&raw.version).unwrap_or_default(),
            namespace: raw.namespace,
            parameters: raw.parameters,
            modules,
            resources,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

#[derive(Deserialize)]
struct RawDescriptor {
    #[serde(rename = "_schema-version", default)]
    schema_version: Value,
    #[serde(rename = "ID", alias = "id")]
    id: String,
    #[serde(default)]
    version: Value,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    parameters: Properties,
    #[serde(default)]
    modules: Vec<RawModule>,
    #[serde(default)]
    resources: Vec<RawResource>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawModule {
    name: String,
    #[serde(rename = "type", default)]
    module_type: String,
    #[serde(default)]
    parameters: Properties,
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    properties_metadata: Option<BTreeMap<String, RawMetadata>>,
    #[serde(default)]
    requires: Vec<RequiredDependency>,
    #[serde(default)]
    provides: Vec<ProvidedDependency>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawResource {
    name: String,
    #[serde(rename = "type", default)]
    resource_type: String,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    parameters: Properties,
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    properties_metadata: Option<BTreeMap<String, RawMetadata>>,
    #[serde(default)]
    requires: Vec<RequiredDependency>,
}

#[derive(Deserialize)]
struct RawMetadata {
    #[serde(default)]
    datatype: Option<String>,
}

fn normalize_module(raw: RawModule, version: SchemaVersion) -> Result<Module> {
    let property_types = property_types(&raw.name, raw.properties_metadata, version)?;
    Ok(Module {
        name: raw.name,
        module_type: raw.module_type,
        parameters: raw.parameters,
        properties: raw.properties,
        property_types,
        requires: raw.requires,
        provides: raw.provides,
    })
}

fn normalize_resource(raw: RawResource, version: SchemaVersion) -> Result<Resource> {
    let property_types = property_types(&raw.name, raw.properties_metadata, version)?;
    let (active, requires) = match version {
        SchemaVersion::V3 => (raw.active.unwrap_or(true), raw.requires),
        SchemaVersion::V2 => {
            if raw.active.is_some() || !raw.requires.is_empty() {
                warn!(resource = %raw.name, "Ignoring schema v3 resource attributes in a v2 descriptor");
            }
            (true, Vec::new())
        }
    };
    Ok(Resource {
        name: raw.name,
        resource_type: raw.resource_type,
        active,
        optional: raw.optional,
        parameters: raw.parameters,
        properties: raw.properties,
        property_types,
        requires,
    })
}

fn property_types(
    owner: &str,
    metadata: Option<BTreeMap<String, RawMetadata>>,
    version: SchemaVersion,
) -> Result<PropertyTypes> {
    let Some(metadata) = metadata else {
        return Ok(PropertyTypes::new());
    };
    if version == SchemaVersion::V2 {
        warn!(owner, "Ignoring properties-metadata in a v2 descriptor");
        return Ok(PropertyTypes::new());
    }
    metadata
        .into_iter()
        .filter_map(|(key, meta)| meta.datatype.map(|datatype| (key, datatype)))
        .map(|(key, datatype)| datatype.parse::<ParameterType>().map(|ty| (key, ty)))
        .collect()
}

/// YAML readers turn unquoted versions like `3.1` into numbers
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V3_DOCUMENT: &str = r#"
_schema-version: "3.1"
ID: com.acme.shop
version: 1.2.0
modules:
  - name: web
    type: nodejs
    properties:
      port: "${backend-api/port}"
    properties-metadata:
      port:
        datatype: int
    requires:
      - name: backend-api
      - name: partner-config
        list: partners
    provides:
      - name: web-api
        public: true
        properties:
          url: "${default-url}"
resources:
  - name: partner-config
    type: configuration
    active: false
    parameters:
      provider-id: "partner:api"
"#;

    #[test]
    fn test_parse_v3_document() {
        let descriptor = DescriptorParser::from_yaml_str(V3_DOCUMENT).unwrap();
        assert_eq!(descriptor.id, "com.acme.shop");
        assert_eq!(descriptor.version, "1.2.0");
        assert_eq!(descriptor.schema_version, "3.1");

        let web = descriptor.module("web").unwrap();
        assert_eq!(web.property_types.get("port"), Some(&ParameterType::Integer));
        assert_eq!(web.requires[1].list.as_deref(), Some("partners"));
        assert!(web.provides[0].public);

        let resource = descriptor.resource("partner-config").unwrap();
        assert!(!resource.active);
    }

    #[test]
    fn test_v2_ignores_v3_attributes() {
        let document = V3_DOCUMENT.replace("\"3.1\"", "2.1");
        let descriptor = DescriptorParser::from_yaml_str(&document).unwrap();
        assert_eq!(descriptor.schema_version, "2.1");
        assert!(descriptor.resource("partner-config").unwrap().active);
        assert!(descriptor.module("web").unwrap().property_types.is_empty());
    }

    #[test]
    fn test_unsupported_schema_version() {
        let document = V3_DOCUMENT.replace("\"3.1\"", "\"1.0\"");
        let err = DescriptorParser::from_yaml_str(&document).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedSchemaVersion(_)));
    }

    #[test]
    fn test_unknown_datatype_is_rejected() {
        let document = V3_DOCUMENT.replace("datatype: int", "datatype: float");
        let err = DescriptorParser::from_yaml_str(&document).unwrap_err();
        assert!(matches!(err, ModelError::UnknownDatatype(_)));
    }

    #[test]
    fn test_json_document() {
        let descriptor = DescriptorParser::from_json_str(
            r#"{"_schema-version": "3", "ID": "a", "version": "1.0.0"}"#,
        )
        .unwrap();
        assert!(descriptor.modules.is_empty());
        assert!(DescriptorParser::from_json_str(r#"{"ID": "a"}"#).is_err());
    }

    #[test]
    fn test_duplicate_resource_is_rejected() {
        let err = DescriptorParser::from_json_str(
            r#"{"_schema-version": "3", "ID": "a", "version": "1.0.0",
                "resources": [{"name": "db", "type": "postgres"}, {"name": "db", "type": "mysql"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateName { kind: "resource", .. }));
    }
}
