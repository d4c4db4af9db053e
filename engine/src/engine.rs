//! The verification engine context.
//!
//! One [`VerificationEngine`] owns everything a run shares: the triple cache,
//! the admission controller, the reasoner invoker, the teardown coordinator
//! and the watchdog thread. Callers submit requests and return immediately;
//! verdicts land in the cache asynchronously.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use relcheck_ontology::Schema;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheEntry, CheckStatus, Lookup, TripleCache};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::invoker::{ReasonerInvoker, Verdict};
use crate::pool::{Admission, AdmissionController};
use crate::process::HelperProcess;
use crate::report::{Diagnostic, DiagnosticSink, StderrSink, ViolationReport};
use crate::request::{CacheKey, VerificationRequest};
use crate::teardown::{ExitHook, TeardownCause, TeardownCoordinator};
use crate::watchdog::{self, Lifecycle};
use crate::worker::{Finished, TimedOut, WorkerId};

/// What happened to a submitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// First request for its key: a worker was created.
    Scheduled {
        /// The new worker.
        worker: WorkerId,
        /// Whether it started or queued.
        admission: Admission,
    },
    /// The key was already known; only the call site was recorded.
    Deduplicated {
        /// Occurrences recorded for the key so far.
        occurrences: usize,
        /// Verdict known so far.
        status: CheckStatus,
    },
}

/// Point-in-time counters of a running engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Reasoner processes running now.
    pub running: usize,
    /// Workers waiting for a slot.
    pub queued: usize,
    /// Workers submitted and not yet finished.
    pub outstanding: usize,
    /// Highest concurrent running count seen.
    pub peak_running: usize,
    /// Reasoner processes launched.
    pub reasoner_invocations: u64,
    /// Reasoner processes killed for exceeding the budget.
    pub timeouts: u64,
    /// Workers dropped because their reasoner could not be spawned.
    pub spawn_failures: usize,
    /// Distinct keys in the cache.
    pub cache_entries: usize,
}

/// State shared between callers, the watchdog and the panic hook.
pub(crate) struct Inner {
    pub(crate) cache: TripleCache,
    pub(crate) pool: AdmissionController,
    pub(crate) invoker: ReasonerInvoker,
    pub(crate) sink: Arc<dyn DiagnosticSink>,
    pub(crate) teardown: TeardownCoordinator,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) budget: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) defer_reporting: bool,
    fail_quit: bool,
    immediate: AtomicUsize,
    timeouts: AtomicU64,
}

impl Inner {
    /// Records the verdict of a reasoner that exited on its own.
    pub(crate) fn settle(&self, finished: Finished) {
        let Finished {
            worker,
            verdict,
            elapsed,
        } = finished;
        let elapsed_ms = elapsed.as_millis();
        match verdict {
            Verdict::Consistent => {
                debug!(worker = %worker.id, key = %worker.key, elapsed_ms, "check passed");
            }
            Verdict::Terminated => {
                warn!(worker = %worker.id, key = %worker.key, elapsed_ms, "reasoner killed by a signal; no verdict");
            }
            Verdict::Inconsistent => {
                let status = Verdict::violation_for(&worker.request);
                let first = self.cache.mark(&worker.key, status);
                error!(worker = %worker.id, key = %worker.key, code = status.code(), "violation detected");
                if !self.defer_reporting {
                    if let Some(occurrence) = first {
                        self.sink
                            .emit(&Diagnostic::new(worker.key.clone(), occurrence));
                        self.immediate.fetch_add(1, Ordering::SeqCst);
                    }
                }
                if self.fail_quit {
                    self.teardown
                        .run(&TeardownCause::FailQuit(worker.key.to_string()), &self.pool);
                }
            }
        }
    }

    /// Accounts for a worker the watchdog killed. Timeouts never mark a violation.
    pub(crate) fn record_timeout(&self, timed_out: &TimedOut) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
        warn!(
            worker = %timed_out.worker.id,
            key = %timed_out.worker.key,
            elapsed_ms = timed_out.elapsed.as_millis(),
            budget_ms = self.budget.as_millis(),
            "reasoner timed out and was killed"
        );
    }

    /// Drops the cache entry of a check whose reasoner never started, so a
    /// later identical request schedules it again instead of deduplicating
    /// against a verdict that will never arrive.
    pub(crate) fn forget_unstarted(&self, key: &CacheKey) {
        let dropped = self
            .cache
            .forget(key)
            .map_or(0, |entry| entry.occurrences.len());
        warn!(key = %key, dropped, "check never reached a reasoner; forgotten");
    }

    pub(crate) fn immediate_reports(&self) -> usize {
        self.immediate.load(Ordering::SeqCst)
    }

    pub(crate) fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::SeqCst)
    }
}

/// Handle on one verification run.
pub struct VerificationEngine {
    inner: Arc<Inner>,
    watchdog: Mutex<Option<JoinHandle<ViolationReport>>>,
}

impl std::fmt::Debug for VerificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationEngine")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl VerificationEngine {
    /// Starts an engine that reports diagnostics on stderr.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be opened, the helper or
    /// scratch directory cannot be created, or the watchdog cannot start.
    pub fn init(config: EngineConfig) -> Result<Self> {
        Self::init_with_sink(config, Arc::new(StderrSink))
    }

    /// Starts an engine that reports diagnostics to `sink`.
    ///
    /// # Errors
    ///
    /// See [`init`](Self::init).
    pub fn init_with_sink(config: EngineConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        let schema = Schema::open(&config.schema.path, config.schema.base_iri.clone()).map_err(
            |source| EngineError::Schema {
                path: config.schema.path.clone(),
                source,
            },
        )?;
        let budget = config.timeout.budget(&schema);
        let capacity = config.effective_capacity();
        let helper = config
            .helper
            .as_ref()
            .map(|command| HelperProcess::launch(command, &schema.path))
            .transpose()?;
        let invoker = ReasonerInvoker::new(config.reasoner.clone(), schema, config.scratch_format)?;

        let inner = Arc::new(Inner {
            cache: TripleCache::new(),
            pool: AdmissionController::new(capacity),
            invoker,
            sink,
            teardown: TeardownCoordinator::new(helper),
            lifecycle: Lifecycle::default(),
            budget,
            poll_interval: config.poll_interval(),
            defer_reporting: config.defer_reporting,
            fail_quit: config.fail_quit,
            immediate: AtomicUsize::new(0),
            timeouts: AtomicU64::new(0),
        });
        let handle = match watchdog::spawn(Arc::clone(&inner)) {
            Ok(handle) => handle,
            Err(e) => {
                inner.teardown.stop_helper();
                return Err(e);
            }
        };
        info!(
            capacity,
            budget_ms = budget.as_millis(),
            fail_quit = config.fail_quit,
            defer_reporting = config.defer_reporting,
            reasoner = %config.reasoner.program,
            "verification engine started"
        );
        Ok(Self {
            inner,
            watchdog: Mutex::new(Some(handle)),
        })
    }

    /// Replaces what teardown calls at the end (default: exit the process with status 1).
    pub fn set_exit_hook(&self, hook: ExitHook) {
        self.inner.teardown.set_exit_hook(hook);
    }

    /// Submits one request. Returns without waiting for the reasoner.
    ///
    /// The first request for a key schedules a worker; later ones only record
    /// their call site.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Halted`] after teardown, [`EngineError::ShutDown`]
    /// after shutdown, [`EngineError::InvalidRequest`] if a class or property
    /// name cannot be written into an IRI, an I/O error if the scratch file
    /// cannot be written, or [`EngineError::Spawn`] if the reasoner cannot be
    /// started. In the last two cases the key is forgotten, so a later request
    /// for it tries again.
    pub fn submit(&self, request: VerificationRequest) -> Result<Submission> {
        if self.inner.teardown.is_halted() {
            return Err(EngineError::Halted);
        }
        // Held until the worker is counted as outstanding, so the watchdog
        // cannot finish the run while this submission is half-registered.
        let _ticket = self.inner.lifecycle.admit().ok_or(EngineError::ShutDown)?;
        request.validate().map_err(EngineError::InvalidRequest)?;
        let key = request.key();
        match self.inner.cache.record(key.clone(), request.occurrence()) {
            Lookup::Duplicate {
                occurrences,
                status,
            } => {
                debug!(key = %key, occurrences, "duplicate check recorded");
                Ok(Submission::Deduplicated {
                    occurrences,
                    status,
                })
            }
            Lookup::First => match self.schedule(key.clone(), request) {
                Ok(submission) => Ok(submission),
                Err(e) => {
                    self.inner.forget_unstarted(&key);
                    Err(e)
                }
            },
        }
    }

    fn schedule(&self, key: CacheKey, request: VerificationRequest) -> Result<Submission> {
        let job = self.inner.invoker.prepare(&request)?;
        let worker = self.inner.pool.worker(key, request, job);
        let id = worker.id;
        let admission = self.inner.pool.submit(worker, &self.inner.invoker)?;
        if self.inner.teardown.is_halted() {
            // Teardown began after the check at the top of `submit` and may
            // have swept the pool before this worker joined it.
            self.inner.pool.kill_all();
            return Err(EngineError::Halted);
        }
        Ok(Submission::Scheduled {
            worker: id,
            admission,
        })
    }

    /// Current verdict of `key`.
    #[must_use]
    pub fn status(&self, key: &CacheKey) -> Option<CheckStatus> {
        self.inner.cache.status(key)
    }

    /// Cache entry of `key`, with every recorded call site.
    #[must_use]
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.inner.cache.entry(key)
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let pool = &self.inner.pool;
        EngineStats {
            running: pool.running(),
            queued: pool.queued(),
            outstanding: pool.outstanding(),
            peak_running: pool.peak_running(),
            reasoner_invocations: self.inner.invoker.invocations(),
            timeouts: self.inner.timeouts(),
            spawn_failures: pool.spawn_failures(),
            cache_entries: self.inner.cache.len(),
        }
    }

    /// Maximum concurrently running reasoners.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.pool.capacity()
    }

    /// Budget after which a reasoner is killed.
    #[must_use]
    pub fn timeout_budget(&self) -> Duration {
        self.inner.budget
    }

    /// Returns true once teardown has run.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.inner.teardown.is_halted()
    }

    /// Stops accepting requests, waits for all outstanding work, stops the
    /// helper and returns the report.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ShutDown`] if called twice, or an I/O error if
    /// the watchdog thread panicked.
    pub fn shutdown(&self) -> Result<ViolationReport> {
        let handle = self.watchdog.lock().take().ok_or(EngineError::ShutDown)?;
        self.inner.lifecycle.finish_main();
        let report = handle
            .join()
            .map_err(|_| EngineError::Io(std::io::Error::other("watchdog thread panicked")))?;
        self.inner.teardown.stop_helper();
        Ok(report)
    }
}

impl Drop for VerificationEngine {
    fn drop(&mut self) {
        let Some(handle) = self.watchdog.get_mut().take() else {
            return;
        };
        let abandoned = self.inner.pool.kill_all();
        if abandoned > 0 {
            warn!(abandoned, "engine dropped without shutdown; outstanding checks abandoned");
        }
        self.inner.lifecycle.finish_main();
        let _ = handle.join();
        self.inner.teardown.stop_helper();
    }
}

/// Runs the host program's main body; a panic that escapes it runs teardown.
///
/// Panics caught inside `body`, or raised on other threads and never
/// propagated into it, do not tear the run down. After teardown the panic
/// resumes unwinding, unless the exit hook ended the process first.
pub fn run_guarded<R>(engine: &VerificationEngine, body: impl FnOnce() -> R) -> R {
    match std::panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            engine
                .inner
                .teardown
                .run(&TeardownCause::Panic(message), &engine.inner.pool);
            std::panic::resume_unwind(payload)
        }
    }
}
