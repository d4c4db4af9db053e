//! Identifier normalization.
//!
//! The engine caches verification results per *kind* of individual rather
//! than per individual: `onto.person1` and `onto.person7` both normalize to
//! `person`, so a relation checked between two persons is never re-checked
//! for another pair of persons. The collapsing is coarse: distinct individuals of one class share a verdict.

use std::sync::OnceLock;

use regex::Regex;

// The pattern is a literal; compilation cannot fail.
#[allow(clippy::unwrap_used)]
fn numeric_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+$").unwrap())
}

/// Removes a trailing run of ASCII digits: `person12` → `person`.
#[must_use]
pub fn strip_numeric_suffix(name: &str) -> &str {
    match numeric_suffix().find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}

/// Strips any namespace prefix, keeping the text after the last `.`, `#`, `/` or `:`.
///
/// `onto.person1` → `person1`, `http://example.org/family#Person` → `Person`.
#[must_use]
pub fn local_name(name: &str) -> &str {
    match name.rfind(['.', '#', '/', ':']) {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// The cache identity of an ontology individual.
#[must_use]
pub fn normalize_individual(name: &str) -> String {
    strip_numeric_suffix(local_name(name)).to_string()
}

/// Returns true if `name` can be written between `<` and `>` in an IRI.
///
/// Rejects the empty string, whitespace, control characters and the
/// characters IRIs never contain unescaped: `<>"{}|^`, the backtick and the backslash.
#[must_use]
pub fn is_iri_safe(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| {
            c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\')
        })
}
