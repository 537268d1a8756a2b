//! Model error types

use thiserror::Error;

/// Errors raised while building or converting model values
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid version requirement '{requirement}': {reason}")]
    InvalidVersionRequirement { requirement: String, reason: String },

    #[error("Property '{key}' is declared as {expected} but has value {value}")]
    InvalidPropertyType {
        key: String,
        expected: String,
        value: String,
    },

    #[error("Unknown datatype: {0}")]
    UnknownDatatype(String),

    #[error("Invalid target '{0}': expected '<org> <space>'")]
    InvalidTarget(String),

    #[error("Unsupported schema version: {0}")]
    UnsupportedSchemaVersion(String),

    #[error("Invalid descriptor: {0}")]
    Schema(String),

    #[error("Duplicate {kind} name \"{name}\" in \"{scope}\"")]
    DuplicateName {
        kind: &'static str,
        name: String,
        scope: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
