#![cfg(unix)]

mod common;

use std::sync::Barrier;

use common::{relation, Harness};
use relcheck_engine::{EngineError, Submission};

#[test]
fn shutdown_racing_a_submission_leaves_nothing_running() {
    let harness = Harness::new("exit 0");
    for round in 0..100 {
        let engine = harness.start();
        let barrier = Barrier::new(2);
        let submitted = std::thread::scope(|scope| {
            let submitter = scope.spawn(|| {
                barrier.wait();
                engine.submit(relation("onto.person1", "Person", "onto.person2", "Person", round))
            });
            barrier.wait();
            let report = engine.shutdown().unwrap();
            assert!(report.is_clean());
            submitter.join().unwrap()
        });

        match submitted {
            Ok(Submission::Scheduled { .. }) => {
                assert_eq!(engine.stats().reasoner_invocations, 1, "round {round}");
            }
            Err(EngineError::ShutDown) => {
                assert_eq!(engine.stats().reasoner_invocations, 0, "round {round}");
            }
            other => panic!("round {round}: unexpected submission {other:?}"),
        }
        let stats = engine.stats();
        assert_eq!(stats.outstanding, 0, "round {round}");
        assert_eq!(stats.running, 0, "round {round}");
    }
}

#[test]
fn shutdown_waits_for_queued_work() {
    let mut harness = Harness::new("sleep 0.2");
    harness.config.capacity = Some(1);
    let engine = harness.start();
    for (line, subject) in [(1, "onto.alpha"), (2, "onto.beta"), (3, "onto.gamma")] {
        engine
            .submit(relation(subject, "Person", "onto.person1", "Person", line))
            .unwrap();
    }
    assert_eq!(engine.stats().queued, 2);
    let report = engine.shutdown().unwrap();
    assert!(report.is_clean());
    let stats = engine.stats();
    assert_eq!(stats.reasoner_invocations, 3);
    assert_eq!(stats.outstanding, 0);
}
