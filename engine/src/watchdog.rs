//! Watchdog / timeout supervisor.
//!
//! A single background thread owns the lifecycle of every worker after it is
//! submitted: it reaps reasoners that exited, kills those that overran the
//! timeout budget, backfills the admission queue, and once the host is done
//! and nothing is in flight, compiles the violation report.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::engine::Inner;
use crate::error::Result;
use crate::report::{compile, ViolationReport};

#[derive(Debug, Default)]
struct Phase {
    main_done: bool,
    admitting: usize,
}

/// Main-thread completion flag plus the submissions currently being admitted.
///
/// Both live under one lock: once `main_done` is set no new admission can
/// begin, and the watchdog waits for the ones already in progress before it
/// trusts the pool's outstanding count.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    phase: Mutex<Phase>,
    wake: Condvar,
}

/// Registration of one in-progress submission; released on drop.
pub(crate) struct AdmissionTicket<'a> {
    lifecycle: &'a Lifecycle,
}

impl Drop for AdmissionTicket<'_> {
    fn drop(&mut self) {
        self.lifecycle.phase.lock().admitting -= 1;
        self.lifecycle.wake.notify_all();
    }
}

impl Lifecycle {
    /// Registers a submission, or returns `None` once the host program is done.
    pub(crate) fn admit(&self) -> Option<AdmissionTicket<'_>> {
        let mut phase = self.phase.lock();
        if phase.main_done {
            return None;
        }
        phase.admitting += 1;
        Some(AdmissionTicket { lifecycle: self })
    }

    /// Marks the host program as done submitting and wakes the watchdog.
    pub(crate) fn finish_main(&self) {
        self.phase.lock().main_done = true;
        self.wake.notify_all();
    }

    /// True once the host is done and no submission is still being admitted.
    ///
    /// After this returns true the pool's outstanding count can only fall.
    fn quiescent(&self) -> bool {
        let phase = self.phase.lock();
        phase.main_done && phase.admitting == 0
    }

    /// Sleeps for up to `interval`, returning early when woken.
    fn nap(&self, interval: Duration) {
        let mut phase = self.phase.lock();
        let _ = self.wake.wait_for(&mut phase, interval);
    }
}

/// True once nothing can be submitted any more and nothing is queued or running.
fn finished(inner: &Inner) -> bool {
    inner.lifecycle.quiescent() && inner.pool.outstanding() == 0
}

/// Starts the watchdog thread; its result is the end-of-run report.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub(crate) fn spawn(inner: Arc<Inner>) -> Result<JoinHandle<ViolationReport>> {
    let handle = std::thread::Builder::new()
        .name("relcheck-watchdog".to_string())
        .spawn(move || supervise(&inner))?;
    Ok(handle)
}

/// One reconciliation pass: reap, reclaim, backfill.
fn reconcile(inner: &Inner) {
    for finished in inner.pool.reap_finished() {
        inner.settle(finished);
    }
    for timed_out in inner.pool.reclaim_stale(inner.budget) {
        inner.record_timeout(&timed_out);
    }
    let drained = inner.pool.drain(&inner.invoker);
    for key in &drained.failed {
        inner.forget_unstarted(key);
    }
    if drained.started > 0 {
        debug!(started = drained.started, queued = inner.pool.queued(), "admitted queued workers");
    }
}

fn supervise(inner: &Inner) -> ViolationReport {
    let interval = inner.poll_interval;
    debug!(interval_ms = interval.as_millis(), "watchdog running");
    while !finished(inner) {
        reconcile(inner);
        if finished(inner) {
            break;
        }
        inner.lifecycle.nap(interval);
    }

    // Final pass for anything that slipped in after the last iteration.
    reconcile(inner);
    let leftover = inner.pool.outstanding();
    if leftover > 0 {
        warn!(leftover, "work still outstanding at report time");
    }

    let report = compile(
        &inner.cache,
        inner.sink.as_ref(),
        inner.defer_reporting,
        inner.immediate_reports(),
        inner.timeouts(),
    );
    info!(
        violations = report.violations,
        diagnostics = report.total_diagnostics(),
        timeouts = report.timeouts,
        "verification run complete"
    );
    report
}
