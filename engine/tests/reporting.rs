#![cfg(unix)]

mod common;

use common::{age, relation, Harness, REJECT_DOG_PARENTS, REJECT_NEGATIVE_AGE};

#[test]
fn deferred_reporting_emits_every_occurrence_at_the_end() {
    let mut harness = Harness::new(REJECT_DOG_PARENTS);
    harness.config.defer_reporting = true;
    let engine = harness.start();
    for line in [5, 6, 7] {
        engine
            .submit(relation("onto.person1", "Person", "onto.dog1", "Dog", line))
            .unwrap();
    }
    let report = engine.shutdown().unwrap();
    assert_eq!(report.immediate, 0);
    assert_eq!(report.violations, 1);
    let lines: Vec<u32> = report.diagnostics.iter().map(|d| d.call_site.line).collect();
    assert_eq!(lines, [5, 6, 7]);
    assert_eq!(harness.sink.diagnostics(), report.diagnostics);
}

#[test]
fn immediate_reporting_never_repeats_an_occurrence() {
    let harness = Harness::new(REJECT_DOG_PARENTS);
    let engine = harness.start();
    for line in [5, 6, 7] {
        engine
            .submit(relation("onto.person1", "Person", "onto.dog1", "Dog", line))
            .unwrap();
    }
    let report = engine.shutdown().unwrap();
    assert_eq!(report.immediate, 1);
    assert_eq!(report.total_diagnostics(), 3);
    let mut lines: Vec<u32> = harness
        .sink
        .diagnostics()
        .iter()
        .map(|d| d.call_site.line)
        .collect();
    lines.sort_unstable();
    assert_eq!(lines, [5, 6, 7]);
}

#[test]
fn constraint_violation_names_instance_and_value() {
    let harness = Harness::new(REJECT_NEGATIVE_AGE);
    let engine = harness.start();
    engine.submit(age(-5, "onto.person3", 12)).unwrap();
    engine.submit(age(30, "onto.person4", 13)).unwrap();
    let report = engine.shutdown().unwrap();
    assert_eq!(report.violations, 1);
    assert_eq!(
        harness.sink.lines(),
        ["Constraint error on line 12 in file family.rs: person3: instance variable age = -5 violates the ontology constraint age"]
    );
}

#[test]
fn report_renders_as_json() {
    let mut harness = Harness::new(REJECT_NEGATIVE_AGE);
    harness.config.defer_reporting = true;
    let engine = harness.start();
    engine.submit(age(-5, "onto.person3", 12)).unwrap();
    let report = engine.shutdown().unwrap();
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["violations"], 1);
    assert_eq!(json["diagnostics"][0]["key"]["kind"], "constraint");
    assert_eq!(json["diagnostics"][0]["instance"], "person3");
}
