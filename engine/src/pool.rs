//! Worker pool and admission controller.
//!
//! At most `capacity` reasoner processes run at once. Workers over capacity
//! wait in a FIFO queue and are admitted strictly in arrival order as slots
//! free up. All queue, running-set and start-time mutations happen under one
//! lock; the counters mirror that state for lock-free reads.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::invoker::{ReasonerInvoker, ScratchJob, Verdict};
use crate::process::{is_alive, kill_tree};
use crate::request::{CacheKey, VerificationRequest};
use crate::worker::{Finished, RunningWorker, StartStamp, TimedOut, Worker, WorkerId};

/// Where a submitted worker went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The reasoner process was started immediately.
    Started,
    /// The worker waits in the queue at the given 0-based position.
    Queued {
        /// Number of workers ahead of it.
        position: usize,
    },
}

/// Outcome of one backfill pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Drained {
    /// Queued workers whose reasoner started.
    pub started: usize,
    /// Keys of queued workers dropped because their reasoner failed to spawn.
    pub failed: Vec<CacheKey>,
}

#[derive(Debug, Default)]
struct PoolState {
    queue: VecDeque<Worker>,
    running: BTreeMap<WorkerId, RunningWorker>,
    start_times: BTreeMap<WorkerId, StartStamp>,
}

/// Bounded pool of reasoner worker processes.
#[derive(Debug)]
pub struct AdmissionController {
    capacity: usize,
    state: Mutex<PoolState>,
    running: AtomicUsize,
    queued: AtomicUsize,
    outstanding: AtomicUsize,
    peak_running: AtomicUsize,
    spawn_failures: AtomicUsize,
    next_id: AtomicU64,
}

impl AdmissionController {
    /// Creates a pool admitting at most `capacity` (at least one) running workers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(PoolState::default()),
            running: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
            peak_running: AtomicUsize::new(0),
            spawn_failures: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    /// Wraps a prepared request into a worker with a fresh id.
    pub fn worker(&self, key: CacheKey, request: VerificationRequest, job: ScratchJob) -> Worker {
        Worker {
            id: WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            key,
            request,
            job,
        }
    }

    /// Starts `worker` now if a slot is free and nobody is queued, else enqueues it.
    ///
    /// # Errors
    ///
    /// Returns the spawn error if an immediate start fails; the worker is dropped.
    pub fn submit(&self, worker: Worker, invoker: &ReasonerInvoker) -> Result<Admission> {
        let mut state = self.state.lock();
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        if state.running.len() >= self.capacity || !state.queue.is_empty() {
            let position = state.queue.len();
            debug!(worker = %worker.id, key = %worker.key, position, "worker queued");
            state.start_times.insert(worker.id, StartStamp::Queued);
            state.queue.push_back(worker);
            self.sync_counts(&state);
            return Ok(Admission::Queued { position });
        }
        match self.start_locked(&mut state, worker, invoker) {
            Ok(()) => Ok(Admission::Started),
            Err(e) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                self.spawn_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Admits queued workers, head first, while slots are free.
    ///
    /// A queued worker whose reasoner fails to spawn is dropped, no longer
    /// outstanding, and its key is returned in [`Drained::failed`].
    pub fn drain(&self, invoker: &ReasonerInvoker) -> Drained {
        let mut state = self.state.lock();
        let mut drained = Drained::default();
        while state.running.len() < self.capacity {
            let Some(worker) = state.queue.pop_front() else {
                break;
            };
            let id = worker.id;
            let key = worker.key.clone();
            match self.start_locked(&mut state, worker, invoker) {
                Ok(()) => drained.started += 1,
                Err(e) => {
                    warn!(worker = %id, key = %key, error = %e, "queued worker failed to start");
                    state.start_times.remove(&id);
                    self.outstanding.fetch_sub(1, Ordering::SeqCst);
                    self.spawn_failures.fetch_add(1, Ordering::Relaxed);
                    drained.failed.push(key);
                }
            }
        }
        self.sync_counts(&state);
        drained
    }

    fn start_locked(
        &self,
        state: &mut PoolState,
        worker: Worker,
        invoker: &ReasonerInvoker,
    ) -> Result<()> {
        let child = invoker.launch(&worker.job)?;
        let started = Instant::now();
        let id = worker.id;
        debug!(worker = %id, key = %worker.key, pid = child.id(), "worker started");
        state.start_times.insert(id, StartStamp::Started(started));
        state.running.insert(
            id,
            RunningWorker {
                worker,
                child,
                started,
            },
        );
        self.sync_counts(state);
        self.peak_running
            .fetch_max(state.running.len(), Ordering::SeqCst);
        Ok(())
    }

    /// Collects every worker whose reasoner exited on its own.
    pub fn reap_finished(&self) -> Vec<Finished> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let mut exited = Vec::new();
        for (id, running) in state.running.iter_mut() {
            match running.child.try_wait() {
                Ok(Some(status)) => exited.push((*id, Verdict::from_status(status))),
                Ok(None) => {}
                Err(e) => {
                    warn!(worker = %id, error = %e, "cannot poll reasoner; killing it");
                    let verdict = kill_tree(&mut running.child)
                        .map(Verdict::from_status)
                        .unwrap_or(Verdict::Terminated);
                    exited.push((*id, verdict));
                }
            }
        }
        let finished = exited
            .into_iter()
            .filter_map(|(id, verdict)| {
                let running = state.running.remove(&id)?;
                state.start_times.remove(&id);
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                Some(Finished {
                    elapsed: running.elapsed(now),
                    worker: running.worker,
                    verdict,
                })
            })
            .collect();
        self.sync_counts(&state);
        finished
    }

    /// Kills every running worker that has used up `budget`, children first.
    ///
    /// Workers that already exited are left for [`reap_finished`](Self::reap_finished).
    pub fn reclaim_stale(&self, budget: Duration) -> Vec<TimedOut> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let mut stale = Vec::new();
        for (id, running) in state.running.iter_mut() {
            if running.elapsed(now) >= budget && is_alive(&mut running.child) {
                if let Err(e) = kill_tree(&mut running.child) {
                    warn!(worker = %id, error = %e, "failed to reap timed-out reasoner");
                }
                stale.push(*id);
            }
        }
        let timed_out = stale
            .into_iter()
            .filter_map(|id| {
                let running = state.running.remove(&id)?;
                state.start_times.remove(&id);
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                Some(TimedOut {
                    elapsed: running.elapsed(now),
                    worker: running.worker,
                })
            })
            .collect();
        self.sync_counts(&state);
        timed_out
    }

    /// Drops the queue and kills every running worker. Returns how many were killed.
    pub fn kill_all(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.queue.len();
        state.queue.clear();
        let mut killed = 0;
        for (id, mut running) in std::mem::take(&mut state.running) {
            if let Err(e) = kill_tree(&mut running.child) {
                warn!(worker = %id, error = %e, "failed to reap reasoner during teardown");
            }
            killed += 1;
        }
        state.start_times.clear();
        self.outstanding
            .fetch_sub(dropped + killed, Ordering::SeqCst);
        self.sync_counts(&state);
        killed
    }

    /// Start stamp of a worker, if it is queued or running.
    #[must_use]
    pub fn start_stamp(&self, id: WorkerId) -> Option<StartStamp> {
        self.state.lock().start_times.get(&id).copied()
    }

    /// Ids of queued workers, head first.
    #[must_use]
    pub fn queued_ids(&self) -> Vec<WorkerId> {
        self.state.lock().queue.iter().map(|w| w.id).collect()
    }

    fn sync_counts(&self, state: &PoolState) {
        self.running.store(state.running.len(), Ordering::SeqCst);
        self.queued.store(state.queue.len(), Ordering::SeqCst);
    }

    /// Maximum concurrently running workers.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Workers currently running.
    #[must_use]
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Workers currently queued.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Workers submitted and not yet reaped, killed or dropped.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Highest running count observed.
    #[must_use]
    pub fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::SeqCst)
    }

    /// Workers dropped because their reasoner could not be spawned.
    #[must_use]
    pub fn spawn_failures(&self) -> usize {
        self.spawn_failures.load(Ordering::Relaxed)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::ReasonerCommand;
    use crate::request::{CallSite, RelationCheck};
    use relcheck_ontology::{Schema, ScratchFormat};

    fn invoker(dir: &std::path::Path, script: &str) -> ReasonerInvoker {
        let schema_path = dir.join("family.owl");
        std::fs::write(&schema_path, "# schema\n").unwrap();
        let schema = Schema::open(&schema_path, "http://example.org/family#").unwrap();
        let command = ReasonerCommand::new("sh", ["-c", script]);
        ReasonerInvoker::new(command, schema, ScratchFormat::Ntriples).unwrap()
    }

    fn worker(pool: &AdmissionController, invoker: &ReasonerInvoker, n: u32) -> Worker {
        let request = VerificationRequest::Relation(RelationCheck {
            subject: format!("onto.a{n}x"),
            relation: "rel".into(),
            object: "onto.b".into(),
            subject_type: "A".into(),
            object_type: "B".into(),
            call_site: CallSite::new("main.rs", n),
        });
        let job = invoker.prepare(&request).unwrap();
        pool.worker(request.key(), request, job)
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done() {
            assert!(Instant::now() < deadline, "condition not reached");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn over_capacity_workers_queue_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = invoker(dir.path(), "sleep 30");
        let pool = AdmissionController::new(2);
        let mut ids = Vec::new();
        let mut admissions = Vec::new();
        for n in 0..4 {
            let w = worker(&pool, &invoker, n);
            ids.push(w.id);
            admissions.push(pool.submit(w, &invoker).unwrap());
        }
        assert_eq!(
            admissions,
            [
                Admission::Started,
                Admission::Started,
                Admission::Queued { position: 0 },
                Admission::Queued { position: 1 },
            ]
        );
        assert_eq!(pool.running(), 2);
        assert_eq!(pool.queued(), 2);
        assert_eq!(pool.outstanding(), 4);
        assert_eq!(pool.queued_ids(), ids[2..]);
        assert_eq!(pool.start_stamp(ids[3]), Some(StartStamp::Queued));
        assert!(matches!(
            pool.start_stamp(ids[0]),
            Some(StartStamp::Started(_))
        ));
        assert_eq!(pool.drain(&invoker), Drained::default());
        assert_eq!(pool.kill_all(), 2);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn finished_workers_are_reaped_and_backfilled() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = invoker(dir.path(), "exit 0");
        let pool = AdmissionController::new(1);
        for n in 0..3 {
            let w = worker(&pool, &invoker, n);
            pool.submit(w, &invoker).unwrap();
        }
        let mut reaped = 0;
        wait_until(|| {
            let finished = pool.reap_finished();
            assert!(finished.iter().all(|f| f.verdict == Verdict::Consistent));
            reaped += finished.len();
            pool.drain(&invoker);
            assert!(pool.running() <= 1);
            reaped == 3
        });
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.peak_running(), 1);
    }

    #[test]
    fn stale_workers_are_killed() {
        let dir = tempfile::tempdir().unwrap();
        let invoker = invoker(dir.path(), "sleep 30");
        let pool = AdmissionController::new(4);
        let w = worker(&pool, &invoker, 1);
        pool.submit(w, &invoker).unwrap();
        assert!(pool.reclaim_stale(Duration::from_secs(60)).is_empty());
        let timed_out = pool.reclaim_stale(Duration::ZERO);
        assert_eq!(timed_out.len(), 1);
        assert_eq!(pool.running(), 0);
        assert_eq!(pool.outstanding(), 0);
    }
}
