//! MTA Model - Core types for descriptor resolution and configuration binding
//!
//! An MTA (multi-target application) bundles modules and resources that
//! reference each other's properties through `${dependency/key}` placeholders,
//! and may consume resources published by other deployed applications.
//!
//! ## Key Concepts
//!
//! - **DeploymentDescriptor**: Canonical shape of one MTA deployment
//! - **Module / Resource**: Named nodes owning parameters and properties
//! - **RequiredDependency / ProvidedDependency**: Edges between nodes
//! - **ConfigurationEntry**: A resource published to the shared registry
//! - **ConfigurationFilter**: Consumer-side search criteria for entries
//! - **ConfigurationSubscription**: Durable record of a filter binding
//! - **CloudTarget**: An `(org, space)` deployment scope
//!
//! Older descriptor schema versions are normalized into the canonical model
//! by [`DescriptorParser`] before any resolution runs.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod descriptor;
pub mod entry;
pub mod error;
pub mod filter;
pub mod parameter;
pub mod properties;
pub mod schema;
pub mod subscription;
pub mod target;
pub mod version;

// Re-export main types
pub use descriptor::{
    DeploymentDescriptor, Module, ProvidedDependency, RequiredDependency, Resource,
};
pub use entry::{ConfigurationEntry, EntryId, PROVIDER_NID_MTA};
pub use error::{ModelError, Result};
pub use filter::{ConfigurationFilter, DEFAULT_NAMESPACE_KEYWORD};
pub use parameter::ParameterType;
pub use properties::{Properties, PropertyTypes};
pub use schema::{DescriptorParser, SchemaVersion};
pub use subscription::{ConfigurationSubscription, ModuleSnapshot, ResourceSnapshot, SubscriptionId};
pub use target::{CloudTarget, Visibility, WILDCARD};
pub use version::VersionRequirement;
