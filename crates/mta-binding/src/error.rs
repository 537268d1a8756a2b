//! Binding error types

use mta_model::{EntryId, ModelError, SubscriptionId};
use mta_resolver::ResolutionError;
use thiserror::Error;

/// Errors raised by entry registries and subscription stores
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Configuration entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(SubscriptionId),
}

/// Result type for registry and store operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Errors raised while binding a descriptor to published configuration
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("Invalid visibility of provided dependency \"{provider}\": {reason}")]
    InvalidVisibilityDeclaration { provider: String, reason: String },

    #[error("Invalid configuration filter in resource \"{resource}\": {reason}")]
    InvalidFilter { resource: String, reason: String },

    #[error("Multiple configuration entries ({count}) were found matching the filters of resource \"{resource}\"")]
    AmbiguousMatch { resource: String, count: usize },

    #[error("No configuration entries were found matching the filters of resource \"{resource}\"")]
    NoMatch { resource: String },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Result type for binding operations
pub type Result<T> = std::result::Result<T, BindingError>;
