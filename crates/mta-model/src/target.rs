//! Cloud targets and entry visibility

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wildcard accepted in filter-side org or space names
pub const WILDCARD: &str = "*";

/// An `(org, space)` deployment scope
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CloudTarget {
    pub org: String,
    pub space: String,
}

impl CloudTarget {
    pub fn new(org: impl Into<String>, space: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            space: space.into(),
        }
    }

    /// Parse the `"<org> <space>"` text form. Both parts are required.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(org), Some(space), None) => Ok(Self::new(org, space)),
            _ => Err(ModelError::InvalidTarget(text.to_string())),
        }
    }

    /// Whether this (filter-side) target covers `other`, honouring wildcards
    pub fn covers(&self, other: &CloudTarget) -> bool {
        matches_part(&self.org, &other.org) && matches_part(&self.space, &other.space)
    }
}

fn matches_part(pattern: &str, value: &str) -> bool {
    pattern == WILDCARD || pattern == value
}

impl fmt::Display for CloudTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.org, self.space)
    }
}

/// A scope, beyond its own target, that may see a published entry.
///
/// An org-only element covers every space in that org.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Visibility {
    pub org: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
}

impl Visibility {
    pub fn org(org: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            space: None,
        }
    }

    pub fn space(org: impl Into<String>, space: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            space: Some(space.into()),
        }
    }

    pub fn covers(&self, target: &CloudTarget) -> bool {
        self.org == target.org
            && self
                .space
                .as_ref()
                .map_or(true, |space| space == &target.space)
    }
}
