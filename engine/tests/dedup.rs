#![cfg(unix)]

mod common;

use common::{relation, Harness, REJECT_DOG_PARENTS};
use relcheck_engine::{CacheKey, CheckStatus, Submission};

fn dog_parent_key() -> CacheKey {
    CacheKey::Relation {
        subject: "person".into(),
        relation: "hasParent".into(),
        object: "dog".into(),
    }
}

#[test]
fn identical_triples_run_the_reasoner_once() {
    let harness = Harness::new(REJECT_DOG_PARENTS);
    let engine = harness.start();

    let first = engine
        .submit(relation("onto.person1", "Person", "onto.dog1", "Dog", 10))
        .unwrap();
    assert!(matches!(first, Submission::Scheduled { .. }));
    let second = engine
        .submit(relation("onto.person2", "Person", "onto.dog7", "Dog", 20))
        .unwrap();
    assert!(matches!(
        second,
        Submission::Deduplicated { occurrences: 2, .. }
    ));

    let report = engine.shutdown().unwrap();
    let stats = engine.stats();
    assert_eq!(stats.reasoner_invocations, 1);
    assert_eq!(stats.cache_entries, 1);

    let entry = engine.entry(&dog_parent_key()).unwrap();
    assert_eq!(entry.status, CheckStatus::RelationViolation);
    assert_eq!(entry.occurrences.len(), 2);

    // Line 10 was reported at detection time, line 20 by the end-of-run pass.
    assert_eq!(report.immediate, 1);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].call_site.line, 20);
    assert_eq!(
        harness.sink.lines(),
        [
            "Error on line 10 in file family.rs: person.hasParent.dog is not allowed in your ontology",
            "Error on line 20 in file family.rs: person.hasParent.dog is not allowed in your ontology",
        ]
    );
}

#[test]
fn consistent_relation_stays_pending_and_unreported() {
    let harness = Harness::new(REJECT_DOG_PARENTS);
    let engine = harness.start();
    engine
        .submit(relation("onto.person1", "Person", "onto.person2", "Person", 4))
        .unwrap();
    let report = engine.shutdown().unwrap();
    let key = CacheKey::Relation {
        subject: "person".into(),
        relation: "hasParent".into(),
        object: "person".into(),
    };
    assert_eq!(engine.status(&key), Some(CheckStatus::Pending));
    assert!(report.is_clean());
    assert!(harness.sink.lines().is_empty());
}

#[test]
fn distinct_triples_are_verified_separately() {
    let harness = Harness::new(REJECT_DOG_PARENTS);
    let engine = harness.start();
    engine
        .submit(relation("onto.person1", "Person", "onto.dog1", "Dog", 1))
        .unwrap();
    engine
        .submit(relation("onto.person1", "Person", "onto.person2", "Person", 2))
        .unwrap();
    let report = engine.shutdown().unwrap();
    assert_eq!(engine.stats().reasoner_invocations, 2);
    assert_eq!(report.violations, 1);
}
