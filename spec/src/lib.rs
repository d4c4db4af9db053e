//! Ontology-side value types for relcheck.
//!
//! The `relcheck-ontology` crate provides what the verification engine needs
//! to talk to an external reasoner: a handle on the schema document, the
//! identifier normalization that defines cache identity, and throwaway
//! scratch ontologies serialized as N-Triples or Turtle.
//!
//! # Entry Point
//!
//! ```
//! use relcheck_ontology::{IndividualNamer, Schema, ScratchOntology};
//! use relcheck_ontology::serializer::ntriples::to_ntriples;
//!
//! let schema = Schema {
//!     path: "family.owl".into(),
//!     base_iri: "http://example.org/family#".to_string(),
//!     size_bytes: 4096,
//! };
//! let namer = IndividualNamer::new();
//! let scratch = ScratchOntology::relation(&schema, &namer, "Person", "hasParent", "Person");
//! let nt = to_ntriples(&scratch);
//! assert!(nt.contains("hasParent"));
//! ```
//!
//! # Identity
//!
//! ```
//! assert_eq!(relcheck_ontology::names::normalize_individual("onto.person12"), "person");
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod model;
pub mod names;
pub mod scratch;
pub mod serializer;

pub use model::{Individual, IndividualValue, Schema};
pub use scratch::{IndividualNamer, ScratchOntology};
pub use serializer::ScratchFormat;
