//! `relcheck`: verifies a batch of relation and constraint checks against an ontology.
//!
//! Reads one JSON request per line (blank lines and `#` comments are skipped),
//! submits each to the verification engine, waits for every reasoner to
//! finish and prints the violation report.
//!
//! **Usage:**
//! ```
//! relcheck --config relcheck.toml [--requests requests.jsonl] [--fail-quit] [--defer-reporting]
//! ```
//!
//! Exits non-zero if any check was found inconsistent.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use relcheck_engine::{
    run_guarded, EngineConfig, EngineError, VerificationEngine, VerificationRequest,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Run verification requests through an external ontology reasoner.
#[derive(Parser)]
#[command(
    name = "relcheck",
    about = "Check relations and data values against an ontology with an external reasoner"
)]
struct Args {
    /// Engine configuration file (TOML).
    #[arg(long, default_value = "relcheck.toml")]
    config: PathBuf,

    /// JSON-lines request file; `-` reads stdin.
    #[arg(long, default_value = "-")]
    requests: String,

    /// Tear the run down on the first violation.
    #[arg(long)]
    fail_quit: bool,

    /// Report every violation at the end instead of as it is found.
    #[arg(long)]
    defer_reporting: bool,

    /// Override the number of concurrently running reasoners.
    #[arg(long)]
    capacity: Option<usize>,

    /// Print the final report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Log output format (logs go to stderr; filter with RUST_LOG).
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init(),
    }
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = EngineConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?
        .with_env_overrides()
        .context("applying RELCHECK_* overrides")?;
    config.fail_quit |= args.fail_quit;
    config.defer_reporting |= args.defer_reporting;
    if args.capacity.is_some() {
        config.capacity = args.capacity;
    }
    Ok(config)
}

fn open_requests(source: &str) -> Result<Box<dyn BufRead>> {
    if source == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(source).with_context(|| format!("opening {source}"))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Submits every request; returns how many were accepted.
fn submit_all(engine: &VerificationEngine, input: Box<dyn BufRead>, source: &str) -> Result<usize> {
    let mut accepted = 0;
    for (index, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("reading {source}"))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let request: VerificationRequest = serde_json::from_str(line)
            .with_context(|| format!("{source}:{}: malformed request", index + 1))?;
        match engine.submit(request) {
            Ok(_) => accepted += 1,
            Err(EngineError::Halted) => {
                tracing::warn!(line = index + 1, "run halted; remaining requests skipped");
                break;
            }
            Err(e @ (EngineError::Spawn { .. } | EngineError::InvalidRequest(_))) => {
                tracing::error!(line = index + 1, error = %e, "request could not be verified");
            }
            Err(e) => return Err(e).with_context(|| format!("{source}:{}", index + 1)),
        }
    }
    Ok(accepted)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = load_config(&args)?;
    let engine = VerificationEngine::init(config).context("starting verification engine")?;

    let (accepted, report) = run_guarded(&engine, || -> Result<_> {
        let input = open_requests(&args.requests)?;
        let accepted = submit_all(&engine, input, &args.requests)?;
        let report = engine.shutdown().context("finishing verification run")?;
        Ok((accepted, report))
    })?;
    let stats = engine.stats();

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!(
            "Summary: {} request(s), {} distinct check(s), {} reasoner run(s), {} violation(s), {} timeout(s)",
            accepted,
            stats.cache_entries,
            stats.reasoner_invocations,
            report.violations,
            report.timeouts
        );
    }

    if !report.is_clean() {
        eprintln!("relcheck FAILED: {} inconsistent check(s).", report.violations);
        process::exit(1);
    }
    Ok(())
}
