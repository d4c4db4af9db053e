//! Reasoner invoker.
//!
//! Turns a request into a scratch ontology file and launches the external
//! consistency reasoner on it. The reasoner is a black-box oracle: exit
//! status zero means the schema still admits a model, any other exit code
//! means the candidate relation or value is inconsistent with it.

use std::io::Write;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use relcheck_ontology::{IndividualNamer, Schema, ScratchFormat, ScratchOntology};
use tempfile::{NamedTempFile, TempDir};
use tracing::debug;

use crate::cache::CheckStatus;
use crate::config::ReasonerCommand;
use crate::error::{EngineError, Result};
use crate::process::isolate;
use crate::request::VerificationRequest;

/// Outcome of one reasoner process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The reasoner exited successfully.
    Consistent,
    /// The reasoner exited with a failure code.
    Inconsistent,
    /// The reasoner died from a signal (timeout kill or teardown); no verdict.
    Terminated,
}

impl Verdict {
    /// Classifies a reasoner exit status.
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            Verdict::Consistent
        } else if status.code().is_some() {
            Verdict::Inconsistent
        } else {
            Verdict::Terminated
        }
    }

    /// Cache status an inconsistent verdict implies for `request`.
    #[must_use]
    pub fn violation_for(request: &VerificationRequest) -> CheckStatus {
        match request {
            VerificationRequest::Relation(_) => CheckStatus::RelationViolation,
            VerificationRequest::Constraint(_) => CheckStatus::ConstraintViolation,
        }
    }
}

/// The private scratch file of one worker. Deleted when dropped.
#[derive(Debug)]
pub struct ScratchJob {
    file: NamedTempFile,
}

impl ScratchJob {
    /// Path of the scratch document.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }
}

/// Builds scratch ontologies and launches reasoner processes on them.
#[derive(Debug)]
pub struct ReasonerInvoker {
    command: ReasonerCommand,
    schema: Schema,
    format: ScratchFormat,
    namer: IndividualNamer,
    scratch_dir: TempDir,
    launches: AtomicU64,
}

impl ReasonerInvoker {
    /// Creates an invoker with a fresh scratch directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch directory cannot be created.
    pub fn new(command: ReasonerCommand, schema: Schema, format: ScratchFormat) -> Result<Self> {
        let scratch_dir = tempfile::Builder::new().prefix("relcheck-").tempdir()?;
        Ok(Self {
            command,
            schema,
            format,
            namer: IndividualNamer::new(),
            scratch_dir,
            launches: AtomicU64::new(0),
        })
    }

    /// Number of reasoner processes launched so far.
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }

    /// Instantiates the request's individuals and writes the scratch document.
    ///
    /// # Errors
    ///
    /// Returns an error if the scratch file cannot be written.
    pub fn prepare(&self, request: &VerificationRequest) -> Result<ScratchJob> {
        let scratch = match request {
            VerificationRequest::Relation(r) => ScratchOntology::relation(
                &self.schema,
                &self.namer,
                &r.subject_type,
                &r.relation,
                &r.object_type,
            ),
            VerificationRequest::Constraint(c) => ScratchOntology::data_value(
                &self.schema,
                &self.namer,
                &c.individual_type,
                &c.constraint,
                &c.value,
            ),
        };
        let mut file = tempfile::Builder::new()
            .prefix("scratch-")
            .suffix(&format!(".{}", self.format.extension()))
            .tempfile_in(self.scratch_dir.path())?;
        file.write_all(self.format.render(&scratch).as_bytes())?;
        file.flush()?;
        Ok(ScratchJob { file })
    }

    /// Launches the reasoner on `job` with its output suppressed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Spawn`] if the reasoner cannot be started.
    pub fn launch(&self, job: &ScratchJob) -> Result<Child> {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(self.command.render_args(&self.schema.path, job.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        isolate(&mut cmd);
        let child = cmd.spawn().map_err(|source| EngineError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;
        self.launches.fetch_add(1, Ordering::Relaxed);
        debug!(pid = child.id(), scratch = %job.path().display(), "reasoner launched");
        Ok(child)
    }
}
