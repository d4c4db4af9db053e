//! Verification requests handed to the engine by call-site instrumentation.

use std::fmt;

use relcheck_ontology::names::{is_iri_safe, local_name, normalize_individual};
use relcheck_ontology::IndividualValue;
use serde::{Deserialize, Serialize};

/// Source location that produced a request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CallSite {
    /// Source file of the call.
    pub file: String,
    /// Line of the call.
    pub line: u32,
}

impl CallSite {
    /// Creates a call-site record.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Check that an object property may link two individuals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationCheck {
    /// Subject individual, e.g. `onto.person1`.
    pub subject: String,
    /// Object property name, e.g. `hasParent`.
    pub relation: String,
    /// Object individual, e.g. `onto.person2`.
    pub object: String,
    /// Class of the subject individual.
    pub subject_type: String,
    /// Class of the object individual.
    pub object_type: String,
    /// Where the relation was established.
    pub call_site: CallSite,
}

/// Check that a data property value satisfies the schema's constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintCheck {
    /// Data property carrying the constraint, e.g. `age`.
    pub constraint: String,
    /// Script-level variable bound to the property.
    pub variable: String,
    /// Candidate value.
    pub value: IndividualValue,
    /// Class of the individual the value belongs to.
    pub individual_type: String,
    /// Ontology individual the value belongs to, e.g. `onto.person3`.
    pub instance: String,
    /// Where the value was assigned.
    pub call_site: CallSite,
}

/// A single verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationRequest {
    /// Object-property check between two individuals.
    Relation(RelationCheck),
    /// Data-property check on one individual.
    Constraint(ConstraintCheck),
}

impl VerificationRequest {
    /// The normalized cache key of this request.
    #[must_use]
    pub fn key(&self) -> CacheKey {
        match self {
            VerificationRequest::Relation(r) => CacheKey::Relation {
                subject: normalize_individual(&r.subject),
                relation: local_name(&r.relation).to_string(),
                object: normalize_individual(&r.object),
            },
            VerificationRequest::Constraint(c) => CacheKey::Constraint {
                constraint: local_name(&c.constraint).to_string(),
                variable: c.variable.clone(),
                value: c.value.clone(),
            },
        }
    }

    /// The occurrence record this request contributes to its cache entry.
    #[must_use]
    pub fn occurrence(&self) -> Occurrence {
        match self {
            VerificationRequest::Relation(r) => Occurrence {
                call_site: r.call_site.clone(),
                instance: None,
            },
            VerificationRequest::Constraint(c) => Occurrence {
                call_site: c.call_site.clone(),
                instance: Some(local_name(&c.instance).to_string()),
            },
        }
    }

    /// Checks that every class and property name can be written into an IRI.
    ///
    /// # Errors
    ///
    /// Returns the first offending name, prefixed with the field it came from.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let names = match self {
            VerificationRequest::Relation(r) => vec![
                ("relation", r.relation.as_str()),
                ("subject_type", r.subject_type.as_str()),
                ("object_type", r.object_type.as_str()),
            ],
            VerificationRequest::Constraint(c) => vec![
                ("constraint", c.constraint.as_str()),
                ("individual_type", c.individual_type.as_str()),
            ],
        };
        match names.into_iter().find(|(_, name)| !is_iri_safe(name)) {
            Some((field, name)) => Err(format!("{field} {name:?} is not a valid IRI name")),
            None => Ok(()),
        }
    }
}

/// Normalized identity of a check. Two requests with equal keys are verified once.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheKey {
    /// `(subject kind, relation, object kind)`.
    Relation {
        /// Subject individual with numeric suffix stripped.
        subject: String,
        /// Relation local name.
        relation: String,
        /// Object individual with numeric suffix stripped.
        object: String,
    },
    /// `(constraint, variable, value)`.
    Constraint {
        /// Data property local name.
        constraint: String,
        /// Script-level variable.
        variable: String,
        /// Tested value.
        value: IndividualValue,
    },
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Relation {
                subject,
                relation,
                object,
            } => write!(f, "{subject}.{relation}.{object}"),
            CacheKey::Constraint {
                constraint,
                variable,
                value,
            } => write!(f, "{constraint}({variable} = {value})"),
        }
    }
}

/// One request's contribution to a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    /// Where the request came from.
    pub call_site: CallSite,
    /// Ontology individual involved, for constraint checks.
    pub instance: Option<String>,
}
