//! Turtle 1.1 serializer for scratch ontologies.

use crate::model::IndividualValue;
use crate::scratch::ScratchOntology;

use super::ntriples::escape;

/// Serializes a scratch ontology to a Turtle string.
#[must_use]
pub fn to_turtle(scratch: &ScratchOntology) -> String {
    let mut out = String::with_capacity(512);

    out.push_str("@prefix owl:  <http://www.w3.org/2002/07/owl#> .\n");
    out.push_str("@prefix rdf:  <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .\n");
    out.push_str("@prefix xsd:  <http://www.w3.org/2001/XMLSchema#> .\n");
    out.push('\n');

    out.push_str(&format!(
        "<{}>\n  a owl:Ontology ;\n  owl:imports <{}> .\n\n",
        scratch.iri, scratch.imports
    ));

    for ind in &scratch.individuals {
        let assertions: String = ind
            .properties
            .iter()
            .map(|(prop, value)| format!(" ;\n  <{}> {}", prop, turtle_object(value)))
            .collect();
        out.push_str(&format!(
            "<{}>\n  a owl:NamedIndividual, <{}>{} .\n\n",
            ind.id, ind.type_, assertions
        ));
    }

    out
}

fn turtle_object(value: &IndividualValue) -> String {
    match value {
        IndividualValue::IriRef(target) => format!("<{}>", target),
        IndividualValue::Str(s) => format!("\"{}\"", escape(s)),
        IndividualValue::Int(i) => format!("\"{}\"^^xsd:integer", i),
        IndividualValue::Float(_) => format!("\"{}\"^^xsd:double", value.lexical_form()),
        IndividualValue::Bool(b) => format!("\"{}\"^^xsd:boolean", b),
    }
}
