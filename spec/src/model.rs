//! Core ontology value types.
//!
//! These types describe the handful of ontology entities the verification
//! engine ever materializes: the schema it checks against, and the transient
//! individuals (with their property assertions) that make up a scratch
//! mini-ontology. The schema's own classes and axioms stay opaque; only the
//! external reasoner interprets them.

use std::fmt;
use std::path::{Path, PathBuf};

/// A value in an individual's property assertion.
///
/// Floats compare and order by their bit pattern so that values can serve as
/// cache keys; `-0.0` and `0.0` are therefore distinct.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum IndividualValue {
    /// A boolean literal.
    Bool(bool),
    /// An integer literal.
    Int(i64),
    /// A floating point literal (`xsd:double`).
    Float(f64),
    /// A plain string literal.
    Str(String),
    /// An IRI reference to another individual. Never produced by deserialization:
    /// untagged strings always land in [`IndividualValue::Str`].
    IriRef(String),
}

impl IndividualValue {
    /// Returns the full XSD datatype IRI for literal values, `None` for IRI references.
    #[must_use]
    pub fn datatype(&self) -> Option<&'static str> {
        match self {
            IndividualValue::Bool(_) => Some(XSD_BOOLEAN),
            IndividualValue::Int(_) => Some(XSD_INTEGER),
            IndividualValue::Float(_) => Some(XSD_DOUBLE),
            IndividualValue::Str(_) => Some(XSD_STRING),
            IndividualValue::IriRef(_) => None,
        }
    }

    /// Lexical form of a literal value as written inside a typed literal.
    ///
    /// Non-finite doubles use the XSD spellings `INF`, `-INF` and `NaN`.
    #[must_use]
    pub fn lexical_form(&self) -> String {
        match self {
            IndividualValue::Float(x) if x.is_nan() => "NaN".to_string(),
            IndividualValue::Float(x) if x.is_infinite() && x.is_sign_negative() => {
                "-INF".to_string()
            }
            IndividualValue::Float(x) if x.is_infinite() => "INF".to_string(),
            IndividualValue::Str(s) | IndividualValue::IriRef(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            IndividualValue::Bool(_) => 0,
            IndividualValue::Int(_) => 1,
            IndividualValue::Float(_) => 2,
            IndividualValue::Str(_) => 3,
            IndividualValue::IriRef(_) => 4,
        }
    }
}

impl PartialEq for IndividualValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for IndividualValue {}

impl PartialOrd for IndividualValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndividualValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self, other) {
            (IndividualValue::Bool(a), IndividualValue::Bool(b)) => a.cmp(b),
            (IndividualValue::Int(a), IndividualValue::Int(b)) => a.cmp(b),
            (IndividualValue::Float(a), IndividualValue::Float(b)) => {
                a.to_bits().cmp(&b.to_bits())
            }
            (IndividualValue::Str(a), IndividualValue::Str(b))
            | (IndividualValue::IriRef(a), IndividualValue::IriRef(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl std::hash::Hash for IndividualValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            IndividualValue::Bool(b) => b.hash(state),
            IndividualValue::Int(i) => i.hash(state),
            IndividualValue::Float(f) => f.to_bits().hash(state),
            IndividualValue::Str(s) | IndividualValue::IriRef(s) => s.hash(state),
        }
    }
}

impl fmt::Display for IndividualValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndividualValue::Bool(b) => write!(f, "{b}"),
            IndividualValue::Int(i) => write!(f, "{i}"),
            IndividualValue::Float(x) => write!(f, "{x}"),
            IndividualValue::Str(s) => write!(f, "{s:?}"),
            IndividualValue::IriRef(iri) => write!(f, "<{iri}>"),
        }
    }
}

/// A named individual (OWL `owl:NamedIndividual`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Individual {
    /// Full IRI.
    pub id: String,
    /// Full IRI of the class this individual is an instance of.
    pub type_: String,
    /// Property assertions: pairs of (property IRI, value).
    pub properties: Vec<(String, IndividualValue)>,
}

impl Individual {
    /// Creates an individual with no property assertions.
    pub fn new(id: impl Into<String>, type_: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_: type_.into(),
            properties: Vec::new(),
        }
    }

    /// Appends a property assertion.
    pub fn assert(&mut self, property: impl Into<String>, value: IndividualValue) {
        self.properties.push((property.into(), value));
    }
}

/// Handle on the ontology schema file the reasoner checks against.
///
/// Only metadata is read: the engine never parses the schema. Its size is the
/// input to the reasoner timeout heuristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Location of the schema document.
    pub path: PathBuf,
    /// Base IRI that local class and property names expand against.
    pub base_iri: String,
    /// Size of the schema document in bytes.
    pub size_bytes: u64,
}

impl Schema {
    /// Opens a schema handle, recording the document size.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema file metadata cannot be read.
    pub fn open(path: impl AsRef<Path>, base_iri: impl Into<String>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size_bytes = std::fs::metadata(&path)?.len();
        Ok(Self {
            path,
            base_iri: base_iri.into(),
            size_bytes,
        })
    }

    /// Expands a local name against the base IRI. Absolute IRIs pass through.
    #[must_use]
    pub fn iri(&self, name: &str) -> String {
        if is_absolute_iri(name) {
            return name.to_string();
        }
        let base = self.base_iri.as_str();
        if base.ends_with('#') || base.ends_with('/') {
            format!("{base}{name}")
        } else {
            format!("{base}#{name}")
        }
    }

    /// Returns the schema size in KiB, as used by the timeout heuristic.
    #[must_use]
    pub fn size_kib(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }
}

fn is_absolute_iri(name: &str) -> bool {
    match name.split_once(':') {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-')
                && rest.starts_with("//")
        }
        None => false,
    }
}

/// Full IRI of `xsd:string`.
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
/// Full IRI of `xsd:integer`.
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
/// Full IRI of `xsd:boolean`.
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
/// Full IRI of `xsd:double`.
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
