//! MTA Resolver - Placeholder resolution over deployment descriptors
//!
//! Modules, resources and provided dependencies reference each other's
//! values through `${dependency/key}` placeholders. This crate resolves
//! those references, either completely or leaving references to selected
//! dependencies untouched for a later pass.
//!
//! ## Building blocks
//!
//! - [`visitor`]: structural traversal of every string leaf in a value tree
//! - [`ReferencePattern`]: placeholder syntax, fully qualified or scoped
//! - [`EscapeSequenceReplacer`]: reversible escaping of literal placeholders
//! - [`ReferenceResolver`]: dependency-ordered substitution with cycle detection
//! - [`PropertiesExpander`]: rewrites references when a list dependency
//!   expands into several bound instances
//!
//! ```
//! use mta_model::{DeploymentDescriptor, Module, ProvidedDependency};
//! use serde_json::json;
//!
//! let provided = ProvidedDependency::new("backend-api")
//!     .with_properties(json!({"url": "https://api"}).as_object().cloned().unwrap());
//! let web = Module::new("web", "nodejs")
//!     .with_properties(json!({"api": "${backend-api/url}/v1"}).as_object().cloned().unwrap());
//! let descriptor = DeploymentDescriptor::new("shop", "1.0.0")
//!     .with_module(Module::new("backend", "java").providing(provided))
//!     .with_module(web);
//!
//! let resolved = mta_resolver::resolve_full(&descriptor).unwrap();
//! assert_eq!(resolved.modules[1].properties["api"], json!("https://api/v1"));
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod escape;
pub mod expander;
pub mod pattern;
pub mod resolver;
pub mod visitor;

pub use error::{ResolutionError, Result};
pub use escape::{unescape_descriptor, EscapeRule, EscapeSequenceReplacer};
pub use expander::{referencing_properties, PropertiesExpander};
pub use pattern::{Reference, ReferenceMatch, ReferencePattern};
pub use resolver::{
    apply_property_types, resolve_full, resolve_partial, PartialResolution, ReferenceResolver,
};
