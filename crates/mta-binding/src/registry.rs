//! Configuration entry registry
//!
//! The registry holds entries published by deployed applications. Queries
//! are coarse pre-selections; filter semantics such as version ranges,
//! wildcards and visibility are applied by the
//! [`ConfigurationFilterMatcher`](crate::ConfigurationFilterMatcher).

use crate::error::{RegistryError, RegistryResult as Result};
use async_trait::async_trait;
use dashmap::DashMap;
use mta_model::{CloudTarget, ConfigurationEntry, ConfigurationFilter, EntryId};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Exact-field entry query; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryQuery {
    pub provider_nid: Option<String>,
    pub provider_id: Option<String>,
    pub provider_namespace: Option<String>,
    pub target: Option<CloudTarget>,
    pub space_id: Option<String>,
}

impl EntryQuery {
    pub fn provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn target(mut self, target: CloudTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn space_id(mut self, space_id: impl Into<String>) -> Self {
        self.space_id = Some(space_id.into());
        self
    }

    /// Query for every entry a filter could possibly match
    pub fn for_filter(filter: &ConfigurationFilter) -> Self {
        Self {
            provider_nid: filter.provider_nid.clone(),
            provider_id: Some(filter.provider_id.clone()),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &ConfigurationEntry) -> bool {
        fn field_matches(expected: &Option<String>, actual: Option<&str>) -> bool {
            expected.as_deref().map_or(true, |e| Some(e) == actual)
        }

        field_matches(&self.provider_nid, entry.provider_nid.as_deref())
            && field_matches(&self.provider_id, Some(entry.provider_id.as_str()))
            && field_matches(&self.provider_namespace, entry.provider_namespace.as_deref())
            && field_matches(&self.space_id, entry.space_id.as_deref())
            && self.target.as_ref().map_or(true, |t| *t == entry.target)
    }
}

/// Shared store of published configuration entries
#[async_trait]
pub trait ConfigurationEntryRegistry: Send + Sync {
    /// Entries matching `query`, ordered by id
    async fn find_entries(&self, query: &EntryQuery) -> Result<Vec<ConfigurationEntry>>;

    /// Insert or replace an entry; a zero id is assigned a fresh one
    async fn save(&self, entry: ConfigurationEntry) -> Result<ConfigurationEntry>;

    /// Remove an entry
    async fn delete(&self, id: EntryId) -> Result<()>;

    /// All entries, ordered by id
    async fn list(&self) -> Result<Vec<ConfigurationEntry>>;
}

/// In-memory entry registry
pub struct InMemoryConfigurationRegistry {
    entries: DashMap<EntryId, ConfigurationEntry>,
    next_id: AtomicU64,
}

impl InMemoryConfigurationRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn sorted(&self, query: &EntryQuery) -> Vec<ConfigurationEntry> {
        let mut entries: Vec<ConfigurationEntry> = self
            .entries
            .iter()
            .filter(|e| query.matches(e.value()))
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| e.id);
        entries
    }
}

impl Default for InMemoryConfigurationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigurationEntryRegistry for InMemoryConfigurationRegistry {
    async fn find_entries(&self, query: &EntryQuery) -> Result<Vec<ConfigurationEntry>> {
        let entries = self.sorted(query);
        debug!(?query, found = entries.len(), "Queried configuration entries");
        Ok(entries)
    }

    async fn save(&self, mut entry: ConfigurationEntry) -> Result<ConfigurationEntry> {
        if entry.id == 0 {
            entry.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        } else {
            self.next_id.fetch_max(entry.id + 1, Ordering::SeqCst);
        }
        self.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn delete(&self, id: EntryId) -> Result<()> {
        self.entries
            .remove(&id)
            .map(|_| ())
            .ok_or(RegistryError::EntryNotFound(id))
    }

    async fn list(&self) -> Result<Vec<ConfigurationEntry>> {
        Ok(self.sorted(&EntryQuery::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(provider_id: &str, space: &str) -> ConfigurationEntry {
        ConfigurationEntry::new(provider_id, CloudTarget::new("acme", space))
    }

    #[tokio::test]
    async fn test_save_assigns_ids() {
        let registry = InMemoryConfigurationRegistry::new();
        let first = registry.save(entry("a:x", "dev")).await.unwrap();
        let second = registry.save(entry("a:y", "dev")).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        let mut explicit = entry("a:z", "dev");
        explicit.id = 10;
        registry.save(explicit).await.unwrap();
        let next = registry.save(entry("a:w", "dev")).await.unwrap();
        assert_eq!(next.id, 11);
    }

    #[tokio::test]
    async fn test_find_entries() {
        let registry = InMemoryConfigurationRegistry::new();
        registry.save(entry("a:x", "dev")).await.unwrap();
        registry.save(entry("a:x", "prod")).await.unwrap();
        registry.save(entry("b:x", "dev")).await.unwrap();

        let found = registry
            .find_entries(&EntryQuery::default().provider_id("a:x"))
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].id < found[1].id);

        let found = registry
            .find_entries(
                &EntryQuery::default()
                    .provider_id("a:x")
                    .target(CloudTarget::new("acme", "prod")),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(registry.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete() {
        let registry = InMemoryConfigurationRegistry::new();
        let saved = registry.save(entry("a:x", "dev")).await.unwrap();
        registry.delete(saved.id).await.unwrap();
        assert!(registry.list().await.unwrap().is_empty());

        let err = registry.delete(saved.id).await.unwrap_err();
        assert!(matches!(err, RegistryError::EntryNotFound(_)));
    }
}
