//! N-Triples serializer for scratch ontologies.
//!
//! Produces a valid N-Triples document (one triple per line, absolute IRIs).

use crate::model::IndividualValue;
use crate::scratch::ScratchOntology;

const OWL_ONTOLOGY: &str = "http://www.w3.org/2002/07/owl#Ontology";
const OWL_NAMED_INDIVIDUAL: &str = "http://www.w3.org/2002/07/owl#NamedIndividual";
const OWL_IMPORTS: &str = "http://www.w3.org/2002/07/owl#imports";
const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Serializes a scratch ontology to an N-Triples string.
#[must_use]
pub fn to_ntriples(scratch: &ScratchOntology) -> String {
    let mut out = String::with_capacity(512);

    triple(&mut out, &scratch.iri, RDF_TYPE, &iri(OWL_ONTOLOGY));
    triple(&mut out, &scratch.iri, OWL_IMPORTS, &iri(&scratch.imports));

    for ind in &scratch.individuals {
        triple(&mut out, &ind.id, RDF_TYPE, &iri(OWL_NAMED_INDIVIDUAL));
        triple(&mut out, &ind.id, RDF_TYPE, &iri(&ind.type_));
        for (prop_iri, value) in &ind.properties {
            triple(&mut out, &ind.id, prop_iri, &object(value));
        }
    }

    out
}

fn triple(out: &mut String, subj: &str, pred: &str, obj: &str) {
    out.push('<');
    out.push_str(subj);
    out.push_str("> <");
    out.push_str(pred);
    out.push_str("> ");
    out.push_str(obj);
    out.push_str(" .\n");
}

fn iri(s: &str) -> String {
    format!("<{}>", s)
}

pub(crate) fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

fn object(value: &IndividualValue) -> String {
    match (value, value.datatype()) {
        (IndividualValue::IriRef(target), _) => iri(target),
        (literal, Some(dt)) => format!("\"{}\"^^<{}>", escape(&literal.lexical_form()), dt),
        (other, None) => format!("\"{}\"", escape(&other.lexical_form())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Schema;
    use crate::scratch::IndividualNamer;
    use std::path::PathBuf;

    fn schema() -> Schema {
        Schema {
            path: PathBuf::from("family.owl"),
            base_iri: "http://example.org/family#".to_string(),
            size_bytes: 0,
        }
    }

    #[test]
    fn every_line_ends_with_period() {
        let namer = IndividualNamer::new();
        let scratch = ScratchOntology::relation(&schema(), &namer, "Person", "hasParent", "Person");
        let nt = to_ntriples(&scratch);
        assert_eq!(nt.lines().count(), 7);
        for line in nt.lines() {
            assert!(line.ends_with(" ."), "Line does not end with ' .': {line}");
        }
    }

    #[test]
    fn relation_assertion_is_present() {
        let namer = IndividualNamer::new();
        let scratch = ScratchOntology::relation(&schema(), &namer, "Person", "hasParent", "Person");
        let nt = to_ntriples(&scratch);
        assert!(nt.contains(
            "<http://example.org/family#person1> <http://example.org/family#hasParent> <http://example.org/family#person2> .\n"
        ));
        assert!(nt.contains(&format!("<{}> <http://example.org/family> .", OWL_IMPORTS)));
    }

    #[test]
    fn literals_are_typed_and_escaped() {
        let namer = IndividualNamer::new();
        let scratch = ScratchOntology::data_value(
            &schema(),
            &namer,
            "Person",
            "nickname",
            &IndividualValue::Str("say \"hi\"".to_string()),
        );
        let nt = to_ntriples(&scratch);
        assert!(nt.contains(
            "\"say \\\"hi\\\"\"^^<http://www.w3.org/2001/XMLSchema#string> ."
        ));

        let scratch = ScratchOntology::data_value(
            &schema(),
            &namer,
            "Person",
            "age",
            &IndividualValue::Int(-5),
        );
        let nt = to_ntriples(&scratch);
        assert!(nt.contains("\"-5\"^^<http://www.w3.org/2001/XMLSchema#integer> ."));
    }

    #[test]
    fn infinite_doubles_are_valid_literals() {
        let namer = IndividualNamer::new();
        let scratch = ScratchOntology::data_value(
            &schema(),
            &namer,
            "Person",
            "height",
            &IndividualValue::Float(f64::NEG_INFINITY),
        );
        let nt = to_ntriples(&scratch);
        assert!(nt.contains("\"-INF\"^^<http://www.w3.org/2001/XMLSchema#double> ."));
        assert!(!nt.contains("inf\""));
    }
}
