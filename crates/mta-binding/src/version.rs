//! Version requirement evaluation

use crate::error::Result;
use mta_model::VersionRequirement;
use semver::Version;

/// Parses version requirements and checks versions against them
pub trait VersionEvaluator: Send + Sync {
    /// Parse a requirement such as `>=2.0.0 <3.0.0`
    fn parse_requirement(&self, text: &str) -> Result<VersionRequirement>;

    /// Whether `version` satisfies `requirement`
    fn satisfies(&self, version: &Version, requirement: &VersionRequirement) -> bool;
}

/// Semantic-versioning evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct SemverEvaluator;

impl VersionEvaluator for SemverEvaluator {
    fn parse_requirement(&self, text: &str) -> Result<VersionRequirement> {
        Ok(VersionRequirement::parse(text)?)
    }

    fn satisfies(&self, version: &Version, requirement: &VersionRequirement) -> bool {
        requirement.satisfied_by(version)
    }
}
