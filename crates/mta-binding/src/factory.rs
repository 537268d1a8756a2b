//! Subscription creation

use crate::matcher::MatchResult;
use crate::parser::ConfigurationFilterParser;
use mta_model::properties::get_str;
use mta_model::{ConfigurationSubscription, DeploymentDescriptor, Module, RequiredDependency};
use std::collections::BTreeMap;
use tracing::debug;

/// Module parameter naming the deployed application
pub const APP_NAME_PARAMETER: &str = "app-name";

/// Creates subscriptions for modules bound to matched configuration
pub struct ConfigurationSubscriptionFactory {
    parser: ConfigurationFilterParser,
    space_id: String,
}

impl ConfigurationSubscriptionFactory {
    pub fn new(parser: ConfigurationFilterParser, space_id: impl Into<String>) -> Self {
        Self {
            parser,
            space_id: space_id.into(),
        }
    }

    /// One subscription per module dependency on an active filter resource
    /// that matched at least one entry
    pub fn create_subscriptions(
        &self,
        descriptor: &DeploymentDescriptor,
        matches: &BTreeMap<String, MatchResult>,
    ) -> Vec<ConfigurationSubscription> {
        let mut subscriptions = Vec::new();
        for module in &descriptor.modules {
            for dependency in &module.requires {
                if let Some(subscription) = self.subscription_for(descriptor, module, dependency, matches) {
                    subscriptions.push(subscription);
                }
            }
        }
        debug!(mta = %descriptor.id, count = subscriptions.len(), "Created subscriptions");
        subscriptions
    }

    fn subscription_for(
        &self,
        descriptor: &DeploymentDescriptor,
        module: &Module,
        dependency: &RequiredDependency,
        matches: &BTreeMap<String, MatchResult>,
    ) -> Option<ConfigurationSubscription> {
        let resource = descriptor.resource(&dependency.name)?;
        if !resource.active || !matches.get(&resource.name)?.is_matched() {
            return None;
        }
        let filter = self.parser.parse(resource).ok()??;
        let app_name = get_str(&module.parameters, APP_NAME_PARAMETER).unwrap_or(&module.name);
        Some(ConfigurationSubscription::new(
            descriptor.id.as_str(),
            self.space_id.as_str(),
            app_name,
            filter,
            module,
            resource,
        ))
    }
}
