//! Asynchronous ontology-consistency verification.
//!
//! Host programs hand the engine verification requests: "may these two
//! individuals be linked by this relation?" or "may this individual carry
//! this data value?". Each distinct check runs once, as an external reasoner
//! process on a throwaway scratch ontology. Processes are bounded by an
//! admission controller, supervised by a watchdog that kills overruns, and
//! the violations are reported per call site.
//!
//! # Lifecycle
//!
//! ```no_run
//! use relcheck_engine::{run_guarded, EngineConfig, VerificationEngine};
//!
//! # fn main() -> relcheck_engine::Result<()> {
//! let config = EngineConfig::from_file("relcheck.toml".as_ref())?.with_env_overrides()?;
//! let engine = VerificationEngine::init(config)?;
//! // A panic escaping the body tears the run down.
//! let report = run_guarded(&engine, || {
//!     // engine.submit(request)? for every call site...
//!     engine.shutdown()
//! })?;
//! println!("{} violation(s)", report.violations);
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`cache`]: deduplicating triple/value cache.
//! - [`invoker`]: scratch ontology preparation and reasoner launching.
//! - [`pool`]: admission controller capping running reasoners.
//! - [`watchdog`]: reaping, timeout kills and the end-of-run report.
//! - [`report`]: diagnostics and sinks.
//! - [`teardown`]: fail-fast and panic teardown.
//! - [`intercept`]: wrappers that turn calls and constructions into requests.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod intercept;
pub mod invoker;
pub mod pool;
pub mod process;
pub mod report;
pub mod request;
pub mod teardown;
pub mod watchdog;
pub mod worker;

pub use cache::{CacheEntry, CheckStatus, Lookup, TripleCache};
pub use config::{EngineConfig, ReasonerCommand, SchemaConfig, TimeoutPolicy};
pub use engine::{run_guarded, EngineStats, Submission, VerificationEngine};
pub use error::{EngineError, Result};
pub use intercept::{DataValues, DeclaredClass, DeclaredMethod, Instance, Linked};
pub use invoker::{ReasonerInvoker, Verdict};
pub use pool::{Admission, AdmissionController, Drained};
pub use report::{CollectingSink, Diagnostic, DiagnosticSink, StderrSink, ViolationReport};
pub use request::{CacheKey, CallSite, ConstraintCheck, Occurrence, RelationCheck, VerificationRequest};
pub use teardown::{ExitHook, TeardownCause, TeardownCoordinator};
pub use worker::{StartStamp, WorkerId};
