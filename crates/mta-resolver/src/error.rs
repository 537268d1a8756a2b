//! Error types for reference resolution

use mta_model::ModelError;
use thiserror::Error;

/// Errors raised while resolving descriptor references
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The referenced dependency or key does not exist
    #[error("Unable to resolve \"${{{dependency}/{key}}}\" in property \"{property}\" of \"{owner}\"")]
    UnresolvedReference {
        dependency: String,
        key: String,
        owner: String,
        property: String,
    },

    /// Following references led back to a value still being resolved. The
    /// cycle lists the containers of the values involved.
    #[error("Cyclic reference detected: {}", .cycle.join(" -> "))]
    CyclicReference { cycle: Vec<String> },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, ResolutionError>;
