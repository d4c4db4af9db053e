//! Engine error type.

use std::path::PathBuf;

use thiserror::Error;

/// Root error type for all engine failures.
///
/// Ontology violations are *not* errors: they are verdicts recorded in the
/// cache and surfaced through diagnostics.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Filesystem or pipe failure outside of reasoner launching.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A request names a class or property that cannot appear in an IRI.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The schema document could not be opened.
    #[error("cannot open schema {path}: {source}")]
    Schema {
        /// Configured schema location.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// A reasoner or helper process could not be started.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// Teardown ran (fail_quit or an escalated error); no further work is accepted.
    #[error("engine halted by teardown")]
    Halted,

    /// The engine was already shut down.
    #[error("engine already shut down")]
    ShutDown,
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
