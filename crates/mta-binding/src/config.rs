//! Configuration for the binding pipeline

use mta_model::CloudTarget;
use serde::{Deserialize, Serialize};

/// Main binder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinderConfig {
    /// Deployment target configuration
    #[serde(default)]
    pub target: TargetConfig,

    /// Identifier of the space the descriptor is deployed to
    #[serde(default = "default_space_id")]
    pub space_id: String,

    /// Space of the current org searched when a filter finds nothing
    #[serde(default)]
    pub global_config_space: Option<String>,

    /// Separator between a list dependency name and its instance index
    #[serde(default = "default_list_separator")]
    pub list_separator: String,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            space_id: default_space_id(),
            global_config_space: None,
            list_separator: default_list_separator(),
        }
    }
}

/// Deployment target configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Organization name
    #[serde(default = "default_org")]
    pub org: String,

    /// Space name
    #[serde(default = "default_space")]
    pub space: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            org: default_org(),
            space: default_space(),
        }
    }
}

impl TargetConfig {
    pub fn cloud_target(&self) -> CloudTarget {
        CloudTarget::new(self.org.as_str(), self.space.as_str())
    }
}

// Default value helpers
fn default_space_id() -> String {
    "local".to_string()
}

fn default_list_separator() -> String {
    ".".to_string()
}

fn default_org() -> String {
    "local".to_string()
}

fn default_space() -> String {
    "dev".to_string()
}

impl BinderConfig {
    /// Load configuration from defaults, an optional file and `MTA_`
    /// environment variables, in increasing precedence
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&BinderConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with MTA_ prefix, e.g. MTA_TARGET__ORG
        builder = builder.add_source(
            config::Environment::with_prefix("MTA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Configuration for deploying into `target`
    pub fn for_target(target: CloudTarget, space_id: impl Into<String>) -> Self {
        Self {
            target: TargetConfig {
                org: target.org,
                space: target.space,
            },
            space_id: space_id.into(),
            ..Default::default()
        }
    }

    pub fn with_global_config_space(mut self, space: impl Into<String>) -> Self {
        self.global_config_space = Some(space.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BinderConfig::default();
        assert_eq!(config.target.cloud_target(), CloudTarget::new("local", "dev"));
        assert_eq!(config.list_separator, ".");
        assert!(config.global_config_space.is_none());
    }

    #[test]
    fn test_load_defaults() {
        let config = BinderConfig::load(None).unwrap();
        assert_eq!(config.space_id, "local");
        assert_eq!(config.target.org, "local");
    }

    #[test]
    fn test_for_target() {
        let config = BinderConfig::for_target(CloudTarget::new("acme", "prod"), "guid")
            .with_global_config_space("shared");
        assert_eq!(config.target.cloud_target(), CloudTarget::new("acme", "prod"));
        assert_eq!(config.space_id, "guid");
        assert_eq!(config.global_config_space.as_deref(), Some("shared"));
    }
}
