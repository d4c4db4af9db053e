//! Engine configuration.
//!
//! Loaded from TOML, then overridden by `RELCHECK_*` environment variables:
//!
//! ```toml
//! capacity = 4
//! poll_interval_ms = 500
//! fail_quit = false
//! defer_reporting = true
//!
//! [schema]
//! path = "family.owl"
//! base_iri = "http://example.org/family#"
//!
//! [reasoner]
//! program = "java"
//! args = ["-jar", "hermit.jar", "--consistency", "{schema}", "{scratch}"]
//!
//! [timeout]
//! secs_per_kib = 0.5
//! min_secs = 5.0
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use relcheck_ontology::{Schema, ScratchFormat};
use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Placeholder in reasoner arguments replaced by the schema path.
pub const SCHEMA_PLACEHOLDER: &str = "{schema}";
/// Placeholder in reasoner arguments replaced by the worker's scratch file path.
pub const SCRATCH_PLACEHOLDER: &str = "{scratch}";

/// Runtime configuration for the verification engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum concurrently running reasoner workers. Defaults to the host CPU count.
    #[serde(default)]
    pub capacity: Option<usize>,
    /// Watchdog polling interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long a reasoner invocation may run before it is killed.
    #[serde(default)]
    pub timeout: TimeoutPolicy,
    /// Tear down the whole run on the first violation.
    #[serde(default)]
    pub fail_quit: bool,
    /// Emit every diagnostic at shutdown instead of at detection time.
    #[serde(default)]
    pub defer_reporting: bool,
    /// The ontology schema checked against.
    pub schema: SchemaConfig,
    /// The consistency reasoner launched once per verification.
    pub reasoner: ReasonerCommand,
    /// Optional long-lived helper launched at init and stopped at shutdown.
    #[serde(default)]
    pub helper: Option<ReasonerCommand>,
    /// Document format of scratch files.
    #[serde(default)]
    pub scratch_format: ScratchFormat,
}

/// Location and base IRI of the ontology schema.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    /// Path of the schema document.
    pub path: PathBuf,
    /// Base IRI local names expand against.
    pub base_iri: String,
}

/// An external program plus its argument template.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReasonerCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments; may contain `{schema}` and `{scratch}` placeholders.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ReasonerCommand {
    /// Creates a command from a program and argument template.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Substitutes the placeholders in every argument.
    #[must_use]
    pub fn render_args(&self, schema: &Path, scratch: &Path) -> Vec<String> {
        let schema = schema.display().to_string();
        let scratch = scratch.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(SCHEMA_PLACEHOLDER, &schema)
                    .replace(SCRATCH_PLACEHOLDER, &scratch)
            })
            .collect()
    }
}

/// Reasoner timeout budget.
///
/// The budget is a heuristic: the schema's size stands in for reasoning cost.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutPolicy {
    /// Fixed budget in seconds; overrides the size-derived budget when set.
    #[serde(default)]
    pub fixed_secs: Option<f64>,
    /// Seconds granted per KiB of schema.
    #[serde(default = "default_secs_per_kib")]
    pub secs_per_kib: f64,
    /// Floor of the size-derived budget.
    #[serde(default = "default_min_secs")]
    pub min_secs: f64,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            fixed_secs: None,
            secs_per_kib: default_secs_per_kib(),
            min_secs: default_min_secs(),
        }
    }
}

impl TimeoutPolicy {
    /// Computes the budget for one reasoner invocation against `schema`.
    #[must_use]
    pub fn budget(&self, schema: &Schema) -> Duration {
        let secs = match self.fixed_secs {
            Some(fixed) => fixed,
            None => (schema.size_kib() * self.secs_per_kib).max(self.min_secs),
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_secs_per_kib() -> f64 {
    0.5
}

fn default_min_secs() -> f64 {
    5.0
}

impl EngineConfig {
    /// Creates a configuration with every optional field at its default.
    pub fn new(
        schema_path: impl Into<PathBuf>,
        base_iri: impl Into<String>,
        reasoner: ReasonerCommand,
    ) -> Self {
        Self {
            capacity: None,
            poll_interval_ms: default_poll_interval_ms(),
            timeout: TimeoutPolicy::default(),
            fail_quit: false,
            defer_reporting: false,
            schema: SchemaConfig {
                path: schema_path.into(),
                base_iri: base_iri.into(),
            },
            reasoner,
            helper: None,
            scratch_format: ScratchFormat::default(),
        }
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the document is malformed or misses
    /// a required field.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Reads and parses a TOML file. Relative schema paths resolve against the
    /// file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if config.schema.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.schema.path = dir.join(&config.schema.path);
            }
        }
        Ok(config)
    }

    /// Applies `RELCHECK_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if an override cannot be parsed.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Recognized keys: `RELCHECK_CAPACITY`, `RELCHECK_POLL_INTERVAL_MS`,
    /// `RELCHECK_TIMEOUT_SECS`, `RELCHECK_FAIL_QUIT`, `RELCHECK_DEFER_REPORTING`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if an override cannot be parsed.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("RELCHECK_CAPACITY") {
            self.capacity = Some(parse_override("RELCHECK_CAPACITY", &v)?);
        }
        if let Some(v) = lookup("RELCHECK_POLL_INTERVAL_MS") {
            self.poll_interval_ms = parse_override("RELCHECK_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("RELCHECK_TIMEOUT_SECS") {
            self.timeout.fixed_secs = Some(parse_override("RELCHECK_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("RELCHECK_FAIL_QUIT") {
            self.fail_quit = parse_flag("RELCHECK_FAIL_QUIT", &v)?;
        }
        if let Some(v) = lookup("RELCHECK_DEFER_REPORTING") {
            self.defer_reporting = parse_flag("RELCHECK_DEFER_REPORTING", &v)?;
        }
        Ok(self)
    }

    /// Number of reasoner workers allowed to run at once; never zero.
    #[must_use]
    pub fn effective_capacity(&self) -> usize {
        self.capacity
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(std::num::NonZeroUsize::get)
                    .unwrap_or(1)
            })
            .max(1)
    }

    /// Watchdog polling interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| EngineError::Config(format!("{key}={value:?}: {e}")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(EngineError::Config(format!(
            "{key}={other:?}: expected a boolean"
        ))),
    }
}
