//! Platform process control.
//!
//! Reasoner workers are launched as leaders of their own process group so a
//! JVM (or any other helper) they fork is reachable through the group. Killing
//! a worker kills its direct children first, then the whole group, then the
//! worker itself, and finally reaps it.
//!
//! Only handles this engine spawned are ever signalled.

use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};

use tracing::{debug, warn};

use crate::config::ReasonerCommand;
use crate::error::{EngineError, Result};

/// Puts the command's child in a fresh process group led by itself.
pub fn isolate(command: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    #[cfg(not(unix))]
    {
        let _ = command;
    }
}

/// Lists the direct children of `pid`. Empty where the platform offers no cheap lookup.
#[must_use]
pub fn children_of(pid: u32) -> Vec<u32> {
    #[cfg(target_os = "linux")]
    {
        let task_dir = format!("/proc/{pid}/task");
        let Ok(tasks) = std::fs::read_dir(&task_dir) else {
            return Vec::new();
        };
        let mut children = Vec::new();
        for task in tasks.flatten() {
            let path = task.path().join("children");
            if let Ok(text) = std::fs::read_to_string(&path) {
                children.extend(text.split_whitespace().filter_map(|s| s.parse::<u32>().ok()));
            }
        }
        children.sort_unstable();
        children.dedup();
        children
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = pid;
        Vec::new()
    }
}

#[cfg(unix)]
fn signal_kill(pid: u32) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; a stale pid yields ESRCH.
    let rc = unsafe { libc::kill(pid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pid, error = %io::Error::last_os_error(), "kill failed");
    }
}

#[cfg(unix)]
fn signal_kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: killpg(2) has no memory-safety preconditions; a vanished group yields ESRCH.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %io::Error::last_os_error(), "killpg failed");
    }
}

/// Forcibly terminates `child`, its children and its process group, then reaps it.
///
/// Returns the exit status collected while reaping.
///
/// # Errors
///
/// Returns an error only if reaping the child fails.
pub fn kill_tree(child: &mut Child) -> io::Result<ExitStatus> {
    let pid = child.id();
    if child.try_wait()?.is_none() {
        #[cfg(unix)]
        {
            for grandchild in children_of(pid) {
                signal_kill(grandchild);
            }
            signal_kill_group(pid);
        }
        if let Err(e) = child.kill() {
            // InvalidInput means it already exited between the checks.
            if e.kind() != io::ErrorKind::InvalidInput {
                warn!(pid, error = %e, "kill failed");
            }
        }
    }
    child.wait()
}

/// Returns true if `child` has not exited yet.
#[must_use]
pub fn is_alive(child: &mut Child) -> bool {
    matches!(child.try_wait(), Ok(None))
}

/// A long-lived helper process launched explicitly by this run.
#[derive(Debug)]
pub struct HelperProcess {
    program: String,
    child: Child,
}

impl HelperProcess {
    /// Launches `command` with placeholders rendered against `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Spawn`] if the program cannot be started.
    pub fn launch(command: &ReasonerCommand, schema: &std::path::Path) -> Result<Self> {
        let mut cmd = Command::new(&command.program);
        cmd.args(command.render_args(schema, std::path::Path::new("")))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        isolate(&mut cmd);
        let child = cmd.spawn().map_err(|source| EngineError::Spawn {
            program: command.program.clone(),
            source,
        })?;
        debug!(program = %command.program, pid = child.id(), "helper launched");
        Ok(Self {
            program: command.program.clone(),
            child,
        })
    }

    /// OS process id of the helper.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Returns true if the helper is still running.
    pub fn is_alive(&mut self) -> bool {
        is_alive(&mut self.child)
    }

    /// Kills and reaps the helper and everything in its process group.
    pub fn stop(mut self) {
        match kill_tree(&mut self.child) {
            Ok(status) => debug!(program = %self.program, %status, "helper stopped"),
            Err(e) => warn!(program = %self.program, error = %e, "failed to reap helper"),
        }
    }
}
