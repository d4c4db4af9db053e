//! Shared fixtures: a scratch schema plus `/bin/sh` scripts standing in for the reasoner.
//!
//! Reasoner scripts see `$1` = schema path and `$2` = scratch file path.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use relcheck_engine::{
    CallSite, CollectingSink, ConstraintCheck, EngineConfig, ExitHook, ReasonerCommand,
    RelationCheck, VerificationEngine, VerificationRequest,
};
use relcheck_ontology::IndividualValue;

pub const BASE_IRI: &str = "http://example.org/family#";

/// Fails any relation check whose scratch ontology asserts `hasParent` onto a `Dog`.
pub const REJECT_DOG_PARENTS: &str =
    "grep -q 'family#hasParent' \"$2\" && grep -q 'family#Dog>' \"$2\" && exit 1; exit 0";

/// Fails any data check carrying the literal -5.
pub const REJECT_NEGATIVE_AGE: &str = "grep -q -e '\"-5\"' \"$2\" && exit 1; exit 0";

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub config: EngineConfig,
    pub sink: Arc<CollectingSink>,
}

impl Harness {
    pub fn new(script: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("family.owl");
        std::fs::write(&schema, "# family schema\n").unwrap();
        let mut config = EngineConfig::new(
            schema,
            BASE_IRI,
            ReasonerCommand::new("sh", ["-c", script, "reasoner", "{schema}", "{scratch}"]),
        );
        config.poll_interval_ms = 20;
        config.capacity = Some(2);
        Self {
            dir,
            config,
            sink: Arc::new(CollectingSink::new()),
        }
    }

    pub fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    pub fn start(&self) -> VerificationEngine {
        VerificationEngine::init_with_sink(self.config.clone(), self.sink.clone()).unwrap()
    }
}

/// Exit hook that records the code instead of exiting.
pub fn recording_exit() -> (ExitHook, Arc<AtomicI32>) {
    let code = Arc::new(AtomicI32::new(-1));
    let seen = Arc::clone(&code);
    (Arc::new(move |c| seen.store(c, Ordering::SeqCst)), code)
}

pub fn relation(
    subject: &str,
    subject_type: &str,
    object: &str,
    object_type: &str,
    line: u32,
) -> VerificationRequest {
    VerificationRequest::Relation(RelationCheck {
        subject: subject.into(),
        relation: "hasParent".into(),
        object: object.into(),
        subject_type: subject_type.into(),
        object_type: object_type.into(),
        call_site: CallSite::new("family.rs", line),
    })
}

pub fn age(value: i64, instance: &str, line: u32) -> VerificationRequest {
    VerificationRequest::Constraint(ConstraintCheck {
        constraint: "age".into(),
        variable: "age".into(),
        value: IndividualValue::Int(value),
        individual_type: "Person".into(),
        instance: instance.into(),
        call_site: CallSite::new("family.rs", line),
    })
}

pub fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(20);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(10));
    }
}

pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
