//! Throwaway mini-ontologies handed to the reasoner.
//!
//! A scratch ontology imports the schema and adds either two fresh individuals
//! linked by an object property, or one fresh individual carrying a data
//! property value. The reasoner then decides whether the schema's axioms
//! still admit a model.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::model::{Individual, IndividualValue, Schema};
use crate::names::local_name;

/// Hands out fresh individual names, one counter per class.
///
/// Names follow the `<class-local-lowercase><n>` convention (`person1`,
/// `person2`, ...). The internal lock is the exclusive section in which
/// scratch individuals are instantiated.
#[derive(Debug, Default)]
pub struct IndividualNamer {
    counters: Mutex<HashMap<String, u64>>,
}

impl IndividualNamer {
    /// Creates a namer with every class counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates one fresh individual of each given class while holding the lock.
    ///
    /// Returns the full IRIs in the same order as `classes`.
    pub fn instantiate(&self, schema: &Schema, classes: &[&str]) -> Vec<Individual> {
        let mut counters = self.counters.lock();
        classes
            .iter()
            .map(|class| {
                let class_iri = schema.iri(class);
                let stem = local_name(&class_iri).to_lowercase();
                let n = counters.entry(stem.clone()).or_insert(0);
                *n += 1;
                Individual::new(schema.iri(&format!("{stem}{n}")), class_iri)
            })
            .collect()
    }
}

/// The mini-ontology for exactly one verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchOntology {
    /// IRI of this scratch document.
    pub iri: String,
    /// IRI of the imported schema.
    pub imports: String,
    /// The transient individuals, with their property assertions.
    pub individuals: Vec<Individual>,
}

impl ScratchOntology {
    /// Builds the relation check `subject_type(a) ∧ object_type(b) ∧ relation(a, b)`.
    #[must_use]
    pub fn relation(
        schema: &Schema,
        namer: &IndividualNamer,
        subject_type: &str,
        relation: &str,
        object_type: &str,
    ) -> Self {
        let mut individuals = namer.instantiate(schema, &[subject_type, object_type]);
        let object_iri = individuals[1].id.clone();
        individuals[0].assert(schema.iri(relation), IndividualValue::IriRef(object_iri));
        Self::wrap(schema, individuals)
    }

    /// Builds the data check `individual_type(a) ∧ property(a, value)`.
    #[must_use]
    pub fn data_value(
        schema: &Schema,
        namer: &IndividualNamer,
        individual_type: &str,
        property: &str,
        value: &IndividualValue,
    ) -> Self {
        let mut individuals = namer.instantiate(schema, &[individual_type]);
        individuals[0].assert(schema.iri(property), value.clone());
        Self::wrap(schema, individuals)
    }

    fn wrap(schema: &Schema, individuals: Vec<Individual>) -> Self {
        let first = individuals
            .first()
            .map(|i| local_name(&i.id).to_string())
            .unwrap_or_default();
        Self {
            iri: format!("urn:relcheck:scratch:{first}"),
            imports: schema.base_iri.trim_end_matches(['#', '/']).to_string(),
            individuals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn schema() -> Schema {
        Schema {
            path: PathBuf::from("family.owl"),
            base_iri: "http://example.org/family#".to_string(),
            size_bytes: 0,
        }
    }

    #[test]
    fn namer_counts_per_class() {
        let namer = IndividualNamer::new();
        let s = schema();
        let first = namer.instantiate(&s, &["Person", "Person", "Dog"]);
        let ids: Vec<_> = first.iter().map(|i| local_name(&i.id).to_string()).collect();
        assert_eq!(ids, ["person1", "person2", "dog1"]);
        let again = namer.instantiate(&s, &["Person"]);
        assert_eq!(local_name(&again[0].id), "person3");
    }

    #[test]
    fn relation_links_subject_to_object() {
        let namer = IndividualNamer::new();
        let scratch = ScratchOntology::relation(&schema(), &namer, "Person", "hasParent", "Dog");
        assert_eq!(scratch.individuals.len(), 2);
        let subject = &scratch.individuals[0];
        assert_eq!(subject.type_, "http://example.org/family#Person");
        assert_eq!(
            subject.properties,
            vec![(
                "http://example.org/family#hasParent".to_string(),
                IndividualValue::IriRef("http://example.org/family#dog1".to_string())
            )]
        );
        assert!(scratch.individuals[1].properties.is_empty());
        assert_eq!(scratch.imports, "http://example.org/family");
    }

    #[test]
    fn data_value_sets_one_property() {
        let namer = IndividualNamer::new();
        let scratch = ScratchOntology::data_value(
            &schema(),
            &namer,
            "Person",
            "age",
            &IndividualValue::Int(-5),
        );
        assert_eq!(scratch.individuals.len(), 1);
        assert_eq!(
            scratch.individuals[0].properties[0].1,
            IndividualValue::Int(-5)
        );
        assert_eq!(scratch.iri, "urn:relcheck:scratch:person1");
    }
}
