//! Placeholder syntax
//!
//! A reference is written `${dependency/key}`. Inside the properties of a
//! required dependency the scoped form `${key}` is accepted as well and
//! refers to the dependency itself. A placeholder preceded by an odd number
//! of escape characters is literal text and never matched.

use regex::Regex;
use std::convert::Infallible;
use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

/// Character that escapes a following placeholder
pub const ESCAPE_CHAR: char = '\\';

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(?:(?P<dependency>[^/{}$\s]+)/)?(?P<key>[^{}$]+)\}")
        .expect("placeholder pattern is valid")
});

/// A parsed `(dependency, key)` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub dependency: String,
    pub key: String,
}

impl Reference {
    pub fn new(dependency: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}/{}}}", self.dependency, self.key)
    }
}

/// One placeholder occurrence within a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMatch {
    pub reference: Reference,
    pub span: Range<usize>,
}

/// Which placeholder forms are recognized, and how references render back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferencePattern {
    /// Only `${dependency/key}`
    FullyQualified,
    /// Also `${key}`, meaning `${prefix/key}`
    Scoped { prefix: String },
}

impl ReferencePattern {
    pub fn scoped(prefix: impl Into<String>) -> Self {
        ReferencePattern::Scoped {
            prefix: prefix.into(),
        }
    }

    /// The same pattern scoped to another dependency name
    pub fn rescoped(&self, prefix: &str) -> Self {
        match self {
            ReferencePattern::FullyQualified => ReferencePattern::FullyQualified,
            ReferencePattern::Scoped { .. } => ReferencePattern::scoped(prefix),
        }
    }

    /// Lazily yield every unescaped placeholder in `text`, in order
    pub fn matches<'a>(&'a self, text: &'a str) -> impl Iterator<Item = ReferenceMatch> + 'a {
        PLACEHOLDER.captures_iter(text).filter_map(move |captures| {
            let whole = captures.get(0)?;
            if is_escaped(text, whole.start()) {
                return None;
            }
            let key = captures.name("key")?.as_str();
            let dependency = match (captures.name("dependency"), self) {
                (Some(dependency), _) => dependency.as_str(),
                (None, ReferencePattern::Scoped { prefix }) => prefix.as_str(),
                (None, ReferencePattern::FullyQualified) => return None,
            };
            Some(ReferenceMatch {
                reference: Reference::new(dependency, key),
                span: whole.range(),
            })
        })
    }

    /// Placeholder text for `reference`; references to the scope prefix
    /// render in short form
    pub fn render(&self, reference: &Reference) -> String {
        match self {
            ReferencePattern::Scoped { prefix } if *prefix == reference.dependency => {
                format!("${{{}}}", reference.key)
            }
            _ => reference.to_string(),
        }
    }

    /// Replace placeholders with the text `replace` returns for them.
    ///
    /// Returning `None` leaves the placeholder as written. The second tuple
    /// element reports whether anything was replaced.
    pub fn try_replace<E, F>(&self, text: &str, mut replace: F) -> Result<(String, bool), E>
    where
        F: FnMut(&Reference) -> Result<Option<String>, E>,
    {
        let mut output = String::with_capacity(text.len());
        let mut last = 0;
        let mut replaced = false;
        for found in self.matches(text) {
            if let Some(replacement) = replace(&found.reference)? {
                output.push_str(&text[last..found.span.start]);
                output.push_str(&replacement);
                last = found.span.end;
                replaced = true;
            }
        }
        output.push_str(&text[last..]);
        Ok((output, replaced))
    }

    /// Infallible form of [`try_replace`](Self::try_replace)
    pub fn replace<F>(&self, text: &str, mut replace: F) -> (String, bool)
    where
        F: FnMut(&Reference) -> Option<String>,
    {
        match self.try_replace(text, |reference| Ok::<_, Infallible>(replace(reference))) {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }
}

/// An odd run of escape characters right before `position` escapes it
fn is_escaped(text: &str, position: usize) -> bool {
    let run = text[..position]
        .chars()
        .rev()
        .take_while(|c| *c == ESCAPE_CHAR)
        .count();
    run % 2 == 1
}
