//! Serializers for scratch ontologies.
//!
//! Two serialization formats are supported:
//! - **N-Triples** ([`ntriples`]): the default reasoner input
//! - **Turtle** ([`turtle`]): for reasoners that prefer prefixed documents

pub mod ntriples;
pub mod turtle;

use crate::scratch::ScratchOntology;

/// Document format written to a worker's scratch file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScratchFormat {
    /// N-Triples, `.nt`.
    #[default]
    Ntriples,
    /// Turtle, `.ttl`.
    Turtle,
}

impl ScratchFormat {
    /// File extension for scratch files in this format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ScratchFormat::Ntriples => "nt",
            ScratchFormat::Turtle => "ttl",
        }
    }

    /// Serializes `scratch` in this format.
    #[must_use]
    pub fn render(self, scratch: &ScratchOntology) -> String {
        match self {
            ScratchFormat::Ntriples => ntriples::to_ntriples(scratch),
            ScratchFormat::Turtle => turtle::to_turtle(scratch),
        }
    }
}
