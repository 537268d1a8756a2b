//! Reversible escaping of literal placeholder markers
//!
//! Each [`EscapeRule`] names an escape character, a marker character and the
//! text an escaped marker turns into. When unescaping, a marker preceded by
//! `n` escape characters is rewritten only if `n` is odd: the run collapses
//! to `n / 2` escape characters followed by the replacement. Even runs are
//! left exactly as written.

use crate::pattern::ESCAPE_CHAR;
use crate::visitor::try_visit_descriptor;
use mta_model::DeploymentDescriptor;
use serde_json::Value;
use std::convert::Infallible;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapeRule {
    pub escape: char,
    pub marker: char,
    pub replacement: String,
}

impl EscapeRule {
    pub fn new(escape: char, marker: char, replacement: impl Into<String>) -> Self {
        Self {
            escape,
            marker,
            replacement: replacement.into(),
        }
    }
}

/// Applies a sequence of escape rules to text
#[derive(Debug, Clone)]
pub struct EscapeSequenceReplacer {
    rules: Vec<EscapeRule>,
}

impl Default for EscapeSequenceReplacer {
    fn default() -> Self {
        Self::new(vec![EscapeRule::new(ESCAPE_CHAR, '$', "$")])
    }
}

impl EscapeSequenceReplacer {
    pub fn new(rules: Vec<EscapeRule>) -> Self {
        Self { rules }
    }

    pub fn unescape(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |text, rule| unescape_rule(rule, &text))
    }

    /// Inverse of [`unescape`](Self::unescape) for rules whose replacement
    /// is the marker itself
    pub fn escape(&self, text: &str) -> String {
        self.rules
            .iter()
            .rev()
            .fold(text.to_string(), |text, rule| escape_rule(rule, &text))
    }
}

fn unescape_rule(rule: &EscapeRule, text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut run = 0usize;
    for c in text.chars() {
        if c == rule.escape {
            run += 1;
            continue;
        }
        if c == rule.marker && run % 2 == 1 {
            push_run(&mut output, rule.escape, run / 2);
            output.push_str(&rule.replacement);
        } else {
            push_run(&mut output, rule.escape, run);
            output.push(c);
        }
        run = 0;
    }
    push_run(&mut output, rule.escape, run);
    output
}

fn escape_rule(rule: &EscapeRule, text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut run = 0usize;
    for c in text.chars() {
        if c == rule.escape {
            run += 1;
            continue;
        }
        if c == rule.marker {
            push_run(&mut output, rule.escape, 2 * run + 1);
        } else {
            push_run(&mut output, rule.escape, run);
        }
        output.push(c);
        run = 0;
    }
    push_run(&mut output, rule.escape, run);
    output
}

fn push_run(output: &mut String, escape: char, count: usize) {
    output.extend(std::iter::repeat(escape).take(count));
}

/// Unescape every string value of a fully resolved descriptor
pub fn unescape_descriptor(
    descriptor: &DeploymentDescriptor,
    replacer: &EscapeSequenceReplacer,
) -> DeploymentDescriptor {
    let result = try_visit_descriptor(descriptor, &mut |_, _, value| {
        Ok::<_, Infallible>(Value::String(replacer.unescape(value)))
    });
    match result {
        Ok(descriptor) => descriptor,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_odd_and_even_runs() {
        let replacer = EscapeSequenceReplacer::default();
        assert_eq!(replacer.unescape(r"\${db/url}"), "${db/url}");
        assert_eq!(replacer.unescape(r"\\${db/url}"), r"\\${db/url}");
        assert_eq!(replacer.unescape(r"\\\${db/url}"), r"\${db/url}");
        assert_eq!(replacer.unescape(r"C:\path\to"), r"C:\path\to");
        assert_eq!(replacer.unescape(r"trailing\\"), r"trailing\\");
    }

    #[test]
    fn test_escape() {
        let replacer = EscapeSequenceReplacer::default();
        assert_eq!(replacer.escape("${db/url}"), r"\${db/url}");
        assert_eq!(replacer.escape(r"\${x}"), r"\\\${x}");
        assert_eq!(replacer.escape("no markers"), "no markers");
    }

    #[test]
    fn test_custom_replacement() {
        let replacer = EscapeSequenceReplacer::new(vec![EscapeRule::new('~', '{', "<")]);
        assert_eq!(replacer.unescape("a~{b"), "a<b");
        assert_eq!(replacer.unescape("a~~{b"), "a~~{b");
    }
}
