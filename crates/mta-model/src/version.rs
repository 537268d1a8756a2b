//! Semantic version requirements
//!
//! Filters accept the range syntax descriptor authors commonly write:
//! exact versions (`1.2.3`), comparators separated by whitespace or commas
//! (`>=2.0.0 <3.0.0`), caret/tilde ranges, hyphen ranges (`1.0.0 - 2.0.0`)
//! and `||` alternatives. Each alternative is normalized into a
//! [`semver::VersionReq`].

use crate::error::{ModelError, Result};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::fmt;

const OPERATOR_CHARS: &[char] = &['<', '>', '=', '~', '^'];

/// A parsed version range
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRequirement {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRequirement {
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: String| ModelError::InvalidVersionRequirement {
            requirement: text.to_string(),
            reason,
        };

        let alternatives = text
            .split("||")
            .map(|alternative| {
                let normalized = normalize(alternative).map_err(invalid)?;
                VersionReq::parse(&normalized).map_err(|e| invalid(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: text.trim().to_string(),
            alternatives,
        })
    }

    /// Whether `version` satisfies any alternative of this range
    pub fn satisfied_by(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn normalize(alternative: &str) -> std::result::Result<String, String> {
    let tokens: Vec<&str> = alternative
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty() && *t != "&&" && *t != "&")
        .collect();

    if tokens.is_empty() {
        return Err("empty range".to_string());
    }

    // Hyphen range: `a - b` means `>=a, <=b`
    if let [low, "-", high] = tokens.as_slice() {
        return Ok(format!(">={low}, <={high}"));
    }

    let mut comparators = Vec::with_capacity(tokens.len());
    let mut pending_operator: Option<&str> = None;
    for token in tokens {
        if token.chars().all(|c| OPERATOR_CHARS.contains(&c)) {
            if pending_operator.is_some() {
                return Err(format!("dangling operator before '{token}'"));
            }
            pending_operator = Some(token);
            continue;
        }
        let comparator = match pending_operator.take() {
            Some(op) => format!("{op}{token}"),
            None if starts_with_digit(token) && !has_wildcard(token) => format!("={token}"),
            None => token.to_string(),
        };
        comparators.push(comparator);
    }
    if let Some(op) = pending_operator {
        return Err(format!("operator '{op}' is missing a version"));
    }

    Ok(comparators.join(", "))
}

fn starts_with_digit(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn has_wildcard(token: &str) -> bool {
    token
        .split('.')
        .any(|part| part == "*" || part == "x" || part == "X")
}

impl PartialEq for VersionRequirement {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for VersionRequirement {}

impl TryFrom<String> for VersionRequirement {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<VersionRequirement> for String {
    fn from(value: VersionRequirement) -> Self {
        value.raw
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
