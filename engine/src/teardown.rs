//! Process-teardown coordinator.
//!
//! Teardown is the irreversible end of a run: on `fail_quit` or an uncaught
//! panic it kills every reasoner process this engine started, stops the
//! helper, marks the engine halted and hands control to the exit hook.
//! Nothing outside this run's own process handles is touched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::pool::AdmissionController;
use crate::process::HelperProcess;

/// Called with the exit code once teardown has finished.
pub type ExitHook = Arc<dyn Fn(i32) + Send + Sync>;

/// Exit code handed to the exit hook.
pub const TEARDOWN_EXIT_CODE: i32 = 1;

/// Why teardown ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownCause {
    /// A violation was detected with `fail_quit` set.
    FailQuit(String),
    /// The host program panicked.
    Panic(String),
}

impl std::fmt::Display for TeardownCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeardownCause::FailQuit(what) => write!(f, "fail_quit: {what}"),
            TeardownCause::Panic(what) => write!(f, "uncaught panic: {what}"),
        }
    }
}

/// Owns the helper process and the halted flag.
pub struct TeardownCoordinator {
    halted: AtomicBool,
    helper: Mutex<Option<HelperProcess>>,
    exit_hook: Mutex<ExitHook>,
    // Serializes teardown so concurrent triggers run it once.
    gate: Mutex<()>,
}

impl std::fmt::Debug for TeardownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeardownCoordinator")
            .field("halted", &self.halted)
            .field("helper", &self.helper)
            .finish_non_exhaustive()
    }
}

fn exit_process(code: i32) {
    std::process::exit(code);
}

impl TeardownCoordinator {
    /// Creates a coordinator that exits the process when teardown completes.
    #[must_use]
    pub fn new(helper: Option<HelperProcess>) -> Self {
        Self {
            halted: AtomicBool::new(false),
            helper: Mutex::new(helper),
            exit_hook: Mutex::new(Arc::new(exit_process)),
            gate: Mutex::new(()),
        }
    }

    /// Replaces the exit hook.
    pub fn set_exit_hook(&self, hook: ExitHook) {
        *self.exit_hook.lock() = hook;
    }

    /// Returns true once teardown has run.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Kills all work in `pool`, stops the helper and calls the exit hook.
    ///
    /// Only the first call does anything; later calls return immediately.
    pub fn run(&self, cause: &TeardownCause, pool: &AdmissionController) {
        let hook = {
            let _gate = self.gate.lock();
            if self.halted.swap(true, Ordering::SeqCst) {
                return;
            }
            error!(%cause, "tearing down verification run");
            let killed = pool.kill_all();
            let helper = self.helper.lock().take();
            if let Some(helper) = helper {
                helper.stop();
            }
            error!(killed, "all reasoner processes of this run stopped");
            Arc::clone(&*self.exit_hook.lock())
        };
        hook(TEARDOWN_EXIT_CODE);
    }

    /// Stops the helper during an orderly shutdown.
    pub fn stop_helper(&self) {
        let helper = self.helper.lock().take();
        if let Some(helper) = helper {
            helper.stop();
        }
    }

    /// Returns true if a helper process is currently owned.
    #[must_use]
    pub fn has_helper(&self) -> bool {
        self.helper.lock().is_some()
    }
}
