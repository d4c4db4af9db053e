//! Workers: one reasoner process per verification request.
//!
//! A worker is created when a request misses the cache, waits in the admission
//! queue until a slot frees up, runs as an isolated OS process, and is finally
//! reaped by the watchdog (normal exit) or killed by it (timeout).

use std::fmt;
use std::process::Child;
use std::time::{Duration, Instant};

use crate::invoker::{ScratchJob, Verdict};
use crate::request::{CacheKey, VerificationRequest};

/// Identity of a worker, unique within one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// A not-yet-started or finished worker: the request plus its scratch space.
#[derive(Debug)]
pub struct Worker {
    /// Identity.
    pub id: WorkerId,
    /// Cache key the verdict is recorded under.
    pub key: CacheKey,
    /// The authoritative request for `key`.
    pub request: VerificationRequest,
    pub(crate) job: ScratchJob,
}

/// A worker whose reasoner process is running.
#[derive(Debug)]
pub(crate) struct RunningWorker {
    pub(crate) worker: Worker,
    pub(crate) child: Child,
    pub(crate) started: Instant,
}

impl RunningWorker {
    pub(crate) fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }
}

/// Entry of the start-time table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStamp {
    /// Waiting in the admission queue; never eligible for a timeout kill.
    Queued,
    /// Running since the given instant.
    Started(Instant),
}

/// A worker whose reasoner exited on its own.
#[derive(Debug)]
pub struct Finished {
    /// The reaped worker.
    pub worker: Worker,
    /// What the exit status means.
    pub verdict: Verdict,
    /// Wall time the reasoner ran.
    pub elapsed: Duration,
}

/// A worker the watchdog killed for exceeding the timeout budget.
#[derive(Debug)]
pub struct TimedOut {
    /// The killed worker.
    pub worker: Worker,
    /// Wall time before the kill.
    pub elapsed: Duration,
}
