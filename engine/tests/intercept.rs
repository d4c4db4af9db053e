#![cfg(unix)]

mod common;

use common::{Harness, REJECT_DOG_PARENTS, REJECT_NEGATIVE_AGE};
use relcheck_engine::{
    CallSite, CheckStatus, DataValues, DeclaredClass, DeclaredMethod, Linked, Submission,
    VerificationEngine,
};
use relcheck_ontology::IndividualValue;

struct Person {
    age: i64,
}

impl DataValues for Person {
    fn value_of(&self, variable: &str) -> Option<IndividualValue> {
        (variable == "age").then_some(IndividualValue::Int(self.age))
    }
}

fn adopt(
    engine: &VerificationEngine,
    method: &DeclaredMethod,
    child: &Linked,
    parent: &Linked,
    depth: u32,
) -> Vec<Submission> {
    let (inner, mut outer) = method
        .call(engine, &[child, parent], CallSite::new("family.rs", 30 + depth), || {
            if depth > 0 {
                adopt(engine, method, child, parent, depth - 1)
            } else {
                Vec::new()
            }
        })
        .unwrap();
    outer.extend(inner);
    outer
}

#[test]
fn declared_method_emits_one_request_per_binding() {
    let harness = Harness::new(REJECT_DOG_PARENTS);
    let engine = harness.start();
    let method = DeclaredMethod::new("adopt").bind("hasParent", 0, 1);
    let child = Linked::new("onto.person1", "Person");
    let dog = Linked::new("onto.dog1", "Dog");

    let submissions = adopt(&engine, &method, &child, &dog, 0);
    assert_eq!(submissions.len(), 1);

    let report = engine.shutdown().unwrap();
    assert_eq!(report.violations, 1);
    assert_eq!(
        harness.sink.lines(),
        ["Error on line 30 in file family.rs: person.hasParent.dog is not allowed in your ontology"]
    );
}

#[test]
fn recursive_calls_are_not_checked() {
    let harness = Harness::new("exit 0");
    let engine = harness.start();
    let method = DeclaredMethod::new("adopt").bind("hasParent", 0, 1);
    let child = Linked::new("onto.person1", "Person");
    let parent = Linked::new("onto.person2", "Person");

    let submissions = adopt(&engine, &method, &child, &parent, 3);
    assert_eq!(submissions.len(), 1);
    engine.shutdown().unwrap();
    assert_eq!(engine.stats().cache_entries, 1);
}

#[test]
fn out_of_range_binding_is_skipped() {
    let harness = Harness::new("exit 0");
    let engine = harness.start();
    let method = DeclaredMethod::new("adopt").bind("hasParent", 0, 5);
    let child = Linked::new("onto.person1", "Person");
    let ((), submissions) = method
        .call(&engine, &[&child], CallSite::new("family.rs", 1), || ())
        .unwrap();
    assert!(submissions.is_empty());
    engine.shutdown().unwrap();
}

#[test]
fn declared_class_checks_bound_values() {
    let harness = Harness::new(REJECT_NEGATIVE_AGE);
    let engine = harness.start();
    let class = DeclaredClass::new("Person", "onto").bind("age", "age");

    let (first, _) = class
        .construct(&engine, CallSite::new("family.rs", 50), || Person { age: -5 })
        .unwrap();
    let (second, submissions) = class
        .construct(&engine, CallSite::new("family.rs", 51), || Person { age: -5 })
        .unwrap();
    assert_eq!(first.linked.individual, "onto.person1");
    assert_eq!(second.linked.individual, "onto.person2");
    assert_eq!(second.value.age, -5);
    assert!(matches!(
        submissions[..],
        [Submission::Deduplicated { occurrences: 2, .. }]
    ));

    let report = engine.shutdown().unwrap();
    let key = relcheck_engine::CacheKey::Constraint {
        constraint: "age".into(),
        variable: "age".into(),
        value: IndividualValue::Int(-5),
    };
    assert_eq!(engine.status(&key), Some(CheckStatus::ConstraintViolation));
    assert_eq!(report.total_diagnostics(), 2);
    assert_eq!(report.diagnostics[0].instance.as_deref(), Some("person2"));
}
