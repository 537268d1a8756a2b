//! MTA Binding - Cross-MTA configuration binding
//!
//! Deployed MTAs publish their public provided dependencies as
//! [`ConfigurationEntry`](mta_model::ConfigurationEntry) records. Other MTAs
//! consume them by declaring filter resources (`configuration` or legacy
//! `mta-provided`). The [`Binder`] matches those filters against the
//! registry, injects the matched content into the descriptor, resolves it
//! and records a subscription per consuming module so that later changes to
//! the entries can be propagated.
//!
//! ## Components
//!
//! - [`ConfigurationEntryRegistry`]: shared store of published entries
//! - [`ConfigurationFilterParser`]: filter declarations in resources
//! - [`ConfigurationFilterMatcher`]: entry/filter matching
//! - [`ConfigurationSubscriptionFactory`] and [`SubscriptionStore`]
//! - [`Binder`]: the end-to-end pipeline

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod binder;
pub mod config;
pub mod error;
pub mod factory;
pub mod inject;
pub mod matcher;
pub mod parser;
pub mod publish;
pub mod registry;
pub mod store;
pub mod version;
pub mod visibility;

pub use binder::{Binder, BindingOutcome};
pub use config::{BinderConfig, TargetConfig};
pub use error::{BindingError, RegistryError, RegistryResult, Result};
pub use factory::{ConfigurationSubscriptionFactory, APP_NAME_PARAMETER};
pub use inject::{inject_entries, instance_name};
pub use matcher::{ConfigurationFilterMatcher, MatchResult};
pub use parser::ConfigurationFilterParser;
pub use publish::publish_entries;
pub use registry::{ConfigurationEntryRegistry, EntryQuery, InMemoryConfigurationRegistry};
pub use store::{
    InMemorySubscriptionStore, SubscriptionChanges, SubscriptionQuery, SubscriptionStore,
};
pub use version::{SemverEvaluator, VersionEvaluator};
pub use visibility::{parse_visibility, VISIBILITY_PARAMETER};
