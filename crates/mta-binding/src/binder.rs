//! The binding pipeline
//!
//! Binding a descriptor runs in a fixed order:
//!
//! 1. resolve every reference except those to filter resources
//! 2. match the filters against a registry snapshot
//! 3. create subscriptions for the modules consuming matched resources
//! 4. inject the matched entries, expanding list dependencies
//! 5. resolve the remaining references, unescape and apply property types
//! 6. persist the subscriptions, removing the ones this deployment of the
//!    MTA no longer creates
//!
//! Nothing is persisted unless every step succeeds.

use crate::config::BinderConfig;
use crate::error::Result;
use crate::factory::ConfigurationSubscriptionFactory;
use crate::inject::inject_entries;
use crate::matcher::ConfigurationFilterMatcher;
use crate::parser::ConfigurationFilterParser;
use crate::publish::publish_entries;
use crate::registry::{ConfigurationEntryRegistry, EntryQuery};
use crate::store::{SubscriptionQuery, SubscriptionStore};
use crate::version::{SemverEvaluator, VersionEvaluator};
use mta_model::{ConfigurationEntry, ConfigurationSubscription, DeploymentDescriptor, EntryId};
use mta_resolver::{
    apply_property_types, resolve_full, resolve_partial, unescape_descriptor, EscapeSequenceReplacer,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A fully resolved descriptor and the subscriptions recorded for it
#[derive(Debug, Clone, Serialize)]
pub struct BindingOutcome {
    pub descriptor: DeploymentDescriptor,
    pub subscriptions: Vec<ConfigurationSubscription>,
    /// Subscriptions of an earlier deployment that were not recreated
    pub removed: Vec<ConfigurationSubscription>,
}

/// Binds descriptors to configuration published by other deployments
pub struct Binder {
    config: BinderConfig,
    registry: Arc<dyn ConfigurationEntryRegistry>,
    subscriptions: Arc<dyn SubscriptionStore>,
    parser: ConfigurationFilterParser,
    matcher: ConfigurationFilterMatcher,
    replacer: EscapeSequenceReplacer,
}

impl Binder {
    pub fn new(
        config: BinderConfig,
        registry: Arc<dyn ConfigurationEntryRegistry>,
        subscriptions: Arc<dyn SubscriptionStore>,
    ) -> Self {
        Self::with_evaluator(config, registry, subscriptions, Arc::new(SemverEvaluator))
    }

    pub fn with_evaluator(
        config: BinderConfig,
        registry: Arc<dyn ConfigurationEntryRegistry>,
        subscriptions: Arc<dyn SubscriptionStore>,
        evaluator: Arc<dyn VersionEvaluator>,
    ) -> Self {
        let mut parser = ConfigurationFilterParser::new(config.target.cloud_target(), evaluator.clone());
        if let Some(space) = &config.global_config_space {
            parser = parser.with_global_space(space.as_str());
        }
        Self {
            config,
            registry,
            subscriptions,
            parser,
            matcher: ConfigurationFilterMatcher::new(evaluator),
            replacer: EscapeSequenceReplacer::default(),
        }
    }

    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    /// Resolve `descriptor` against the registry and record its subscriptions
    #[instrument(skip_all, fields(mta = %descriptor.id))]
    pub async fn bind(&self, descriptor: &DeploymentDescriptor) -> Result<BindingOutcome> {
        let filter_resources: BTreeSet<String> = descriptor
            .resources
            .iter()
            .filter(|r| ConfigurationFilterParser::is_filter_resource(r))
            .map(|r| r.name.clone())
            .collect();

        let partial = resolve_partial(descriptor, &filter_resources)?;
        debug!(unresolved = ?partial.unresolved, "Partially resolved descriptor");

        let snapshot = self.snapshot(&partial.descriptor).await?;
        let matches = self
            .matcher
            .match_filters(&self.parser, &partial.descriptor, &snapshot)?;

        let factory =
            ConfigurationSubscriptionFactory::new(self.parser.clone(), self.config.space_id.as_str());
        let subscriptions = factory.create_subscriptions(&partial.descriptor, &matches);

        let injected = inject_entries(
            &partial.descriptor,
            &matches,
            &self.config.list_separator,
            &self.replacer,
        )?;
        let resolved = resolve_full(&injected)?;
        let resolved = apply_property_types(&unescape_descriptor(&resolved, &self.replacer))?;

        let scope = SubscriptionQuery::default()
            .mta_id(descriptor.id.as_str())
            .space_id(self.config.space_id.as_str());
        let changes = self.subscriptions.replace_all(&scope, subscriptions).await?;

        info!(
            filters = matches.len(),
            matched = matches.values().filter(|m| m.is_matched()).count(),
            subscriptions = changes.saved.len(),
            removed = changes.removed.len(),
            "Bound descriptor"
        );
        Ok(BindingOutcome {
            descriptor: resolved,
            subscriptions: changes.saved,
            removed: changes.removed,
        })
    }

    /// Publish the public provided dependencies of a resolved descriptor,
    /// such as [`BindingOutcome::descriptor`], replacing entries an earlier
    /// deployment published for the same provider
    #[instrument(skip_all, fields(mta = %descriptor.id))]
    pub async fn publish(&self, descriptor: &DeploymentDescriptor) -> Result<Vec<ConfigurationEntry>> {
        let target = self.config.target.cloud_target();
        let entries = publish_entries(descriptor, &target, Some(self.config.space_id.as_str()))?;

        let mut saved = Vec::with_capacity(entries.len());
        for mut entry in entries {
            let query = EntryQuery::default()
                .provider_id(entry.provider_id.as_str())
                .target(target.clone());
            if let Some(previous) = self.registry.find_entries(&query).await?.first() {
                entry.id = previous.id;
            }
            saved.push(self.registry.save(entry).await?);
        }

        info!(count = saved.len(), target = %target, "Published configuration entries");
        Ok(saved)
    }

    /// Delete the subscriptions of an undeployed MTA in the configured space
    #[instrument(skip(self))]
    pub async fn unbind(&self, mta_id: &str) -> Result<Vec<ConfigurationSubscription>> {
        let query = SubscriptionQuery::default()
            .mta_id(mta_id)
            .space_id(self.config.space_id.as_str());
        let removed = self.subscriptions.find_all(&query).await?;
        for subscription in &removed {
            self.subscriptions.delete(subscription.id).await?;
        }
        info!(count = removed.len(), "Removed subscriptions");
        Ok(removed)
    }

    /// Every entry a filter of `descriptor` could match, deduplicated
    async fn snapshot(&self, descriptor: &DeploymentDescriptor) -> Result<Vec<ConfigurationEntry>> {
        let mut snapshot: BTreeMap<EntryId, ConfigurationEntry> = BTreeMap::new();
        for resource in descriptor.resources.iter().filter(|r| r.active) {
            let Ok(Some(filter)) = self.parser.parse(resource) else {
                continue;
            };
            for entry in self.registry.find_entries(&EntryQuery::for_filter(&filter)).await? {
                snapshot.entry(entry.id).or_insert(entry);
            }
        }
        debug!(entries = snapshot.len(), "Collected registry snapshot");
        Ok(snapshot.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryConfigurationRegistry;
    use crate::store::InMemorySubscriptionStore;
    use mta_model::{CloudTarget, Module, ProvidedDependency, Properties};
    use serde_json::{json, Value};

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn binder(registry: Arc<InMemoryConfigurationRegistry>) -> Binder {
        Binder::new(
            BinderConfig::for_target(CloudTarget::new("acme", "dev"), "space-guid"),
            registry,
            Arc::new(InMemorySubscriptionStore::default()),
        )
    }

    #[tokio::test]
    async fn test_publish_replaces_previous_entries() {
        let registry = Arc::new(InMemoryConfigurationRegistry::new());
        let binder = binder(registry.clone());
        let provider = DeploymentDescriptor::new("shop", "1.0.0").with_module(
            Module::new("backend", "java").providing(
                ProvidedDependency::new("api")
                    .public()
                    .with_properties(props(json!({"url": "https://shop"}))),
            ),
        );

        let first = binder.publish(&provider).await.unwrap();
        let second = binder.publish(&provider).await.unwrap();
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(registry.list().await.unwrap().len(), 1);
        assert_eq!(second[0].space_id.as_deref(), Some("space-guid"));
    }

    #[tokio::test]
    async fn test_bind_without_filters_only_resolves() {
        let binder = binder(Arc::new(InMemoryConfigurationRegistry::new()));
        let descriptor = DeploymentDescriptor::new("plain", "1.0.0")
            .with_module(
                Module::new("web", "nodejs")
                    .with_properties(props(json!({"db": "${db/host}:5432"})))
                    .requiring(mta_model::RequiredDependency::new("db")),
            )
            .with_resource(
                mta_model::Resource::new("db", "postgres")
                    .with_properties(props(json!({"host": "db.local"}))),
            );

        let outcome = binder.bind(&descriptor).await.unwrap();
        assert_eq!(outcome.descriptor.modules[0].properties["db"], json!("db.local:5432"));
        assert!(outcome.subscriptions.is_empty());
    }
}
