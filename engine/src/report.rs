//! Violation reporter.
//!
//! Violations reach the user through a [`DiagnosticSink`]. With immediate
//! reporting the authoritative occurrence is emitted as soon as the reasoner
//! rejects it and the end-of-run report replays only the remaining
//! occurrences. With deferred reporting every occurrence is emitted at the end.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;

use crate::cache::{CacheEntry, TripleCache};
use crate::request::{CacheKey, CallSite, Occurrence};

/// One line of user-facing output about a violated check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// The violated check.
    pub key: CacheKey,
    /// Where the check was requested.
    pub call_site: CallSite,
    /// Individual the value belongs to, for constraint checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl Diagnostic {
    /// Builds the diagnostic for one occurrence of `key`.
    #[must_use]
    pub fn new(key: CacheKey, occurrence: Occurrence) -> Self {
        Self {
            key,
            call_site: occurrence.call_site,
            instance: occurrence.instance,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let CallSite { file, line } = &self.call_site;
        match &self.key {
            CacheKey::Relation {
                subject,
                relation,
                object,
            } => write!(
                f,
                "Error on line {line} in file {file}: {subject}.{relation}.{object} is not allowed in your ontology"
            ),
            CacheKey::Constraint {
                constraint,
                variable,
                value,
            } => write!(
                f,
                "Constraint error on line {line} in file {file}: {}: instance variable {variable} = {value} violates the ontology constraint {constraint}",
                self.instance.as_deref().unwrap_or("<unknown>")
            ),
        }
    }
}

/// Consumer of diagnostics; stands in for a console formatter.
pub trait DiagnosticSink: Send + Sync {
    /// Delivers one diagnostic.
    fn emit(&self, diagnostic: &Diagnostic);
}

/// Writes each diagnostic as one plain line on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        eprintln!("{diagnostic}");
    }
}

/// Keeps every diagnostic in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    seen: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.seen.lock().clone()
    }

    /// Rendered lines of everything emitted so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.seen.lock().iter().map(ToString::to_string).collect()
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.seen.lock().push(diagnostic.clone());
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViolationReport {
    /// Diagnostics emitted by the end-of-run pass, in key order.
    pub diagnostics: Vec<Diagnostic>,
    /// Diagnostics emitted earlier, at detection time.
    pub immediate: usize,
    /// Distinct checks found inconsistent.
    pub violations: usize,
    /// Reasoner invocations killed for exceeding the budget. Never violations.
    pub timeouts: u64,
}

impl ViolationReport {
    /// Returns true if no check was found inconsistent.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations == 0
    }

    /// Total diagnostics across the run.
    #[must_use]
    pub fn total_diagnostics(&self) -> usize {
        self.immediate + self.diagnostics.len()
    }

    /// Pretty-printed JSON rendering.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Occurrences the end-of-run pass still owes the user for one entry.
///
/// When the first occurrence was already emitted at detection time it is skipped.
pub fn pending_diagnostics<'a>(
    key: &'a CacheKey,
    entry: &'a CacheEntry,
    deferred: bool,
) -> impl Iterator<Item = Diagnostic> + 'a {
    let skip = usize::from(!deferred);
    entry
        .occurrences
        .iter()
        .skip(skip)
        .map(move |occurrence| Diagnostic::new(key.clone(), occurrence.clone()))
}

/// Builds the end-of-run report from the cache and emits its diagnostics to `sink`.
///
/// Only call this once nothing is queued or running: entries still `Pending`
/// are treated as passed.
pub fn compile(
    cache: &TripleCache,
    sink: &dyn DiagnosticSink,
    deferred: bool,
    immediate: usize,
    timeouts: u64,
) -> ViolationReport {
    let mut report = ViolationReport {
        immediate,
        timeouts,
        ..ViolationReport::default()
    };
    for (key, entry) in cache.snapshot() {
        if !entry.status.is_violation() {
            continue;
        }
        report.violations += 1;
        for diagnostic in pending_diagnostics(&key, &entry, deferred) {
            sink.emit(&diagnostic);
            report.diagnostics.push(diagnostic);
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CheckStatus;
    use relcheck_ontology::IndividualValue;

    fn relation_key() -> CacheKey {
        CacheKey::Relation {
            subject: "person".into(),
            relation: "hasParent".into(),
            object: "dog".into(),
        }
    }

    fn age_key() -> CacheKey {
        CacheKey::Constraint {
            constraint: "age".into(),
            variable: "age".into(),
            value: IndividualValue::Int(-5),
        }
    }

    fn at(line: u32, instance: Option<&str>) -> Occurrence {
        Occurrence {
            call_site: CallSite::new("family.rs", line),
            instance: instance.map(str::to_string),
        }
    }

    fn populated() -> TripleCache {
        let cache = TripleCache::new();
        cache.record(relation_key(), at(3, None));
        cache.record(relation_key(), at(8, None));
        cache.record(age_key(), at(12, Some("person1")));
        let passed = CacheKey::Relation {
            subject: "person".into(),
            relation: "hasParent".into(),
            object: "person".into(),
        };
        cache.record(passed, at(20, None));
        cache.mark(&relation_key(), CheckStatus::RelationViolation);
        cache.mark(&age_key(), CheckStatus::ConstraintViolation);
        cache
    }

    #[test]
    fn relation_message_names_the_triple() {
        let d = Diagnostic::new(relation_key(), at(3, None));
        assert_eq!(
            d.to_string(),
            "Error on line 3 in file family.rs: person.hasParent.dog is not allowed in your ontology"
        );
    }

    #[test]
    fn constraint_message_names_instance_and_value() {
        let d = Diagnostic::new(age_key(), at(12, Some("person1")));
        assert_eq!(
            d.to_string(),
            "Constraint error on line 12 in file family.rs: person1: instance variable age = -5 violates the ontology constraint age"
        );
    }

    #[test]
    fn deferred_report_emits_every_occurrence() {
        let cache = populated();
        let sink = CollectingSink::new();
        let report = compile(&cache, &sink, true, 0, 1);
        assert_eq!(report.violations, 2);
        assert_eq!(report.diagnostics.len(), 3);
        assert_eq!(sink.diagnostics(), report.diagnostics);
        assert_eq!(report.timeouts, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn immediate_report_skips_first_occurrence() {
        let cache = populated();
        let sink = CollectingSink::new();
        let report = compile(&cache, &sink, false, 2, 0);
        let lines: Vec<u32> = report.diagnostics.iter().map(|d| d.call_site.line).collect();
        assert_eq!(lines, [8]);
        assert_eq!(report.total_diagnostics(), 3);
    }

    #[test]
    fn clean_cache_gives_clean_report() {
        let cache = TripleCache::new();
        cache.record(relation_key(), at(1, None));
        let report = compile(&cache, &StderrSink, false, 0, 0);
        assert!(report.is_clean());
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn report_serializes_to_json() {
        let report = compile(&populated(), &CollectingSink::new(), true, 0, 0);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["violations"], 2);
        assert_eq!(value["diagnostics"][0]["key"]["kind"], "relation");
    }
}
