//! CLI module for the preflight harness
//!
//! `preflight [OPTIONS] [SPEC]...` loads every `--require`d module in order, then runs the spec files.
//!
//! ## Modules
//!
//! - `discovery` - Expanding positional paths into spec files
//! - `reporter` - `spec`, `dot` and `json` output
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod discovery;
pub mod reporter;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use crate::config::{DEFAULT_TIMEOUT, HarnessConfig, ReporterKind};
use crate::harness::{HarnessError, HarnessRunner, LoadError};

pub use crate::harness::ExitCode;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Load required setup modules, then run spec files
#[derive(Parser, Debug)]
#[command(name = "preflight")]
#[command(version = VERSION)]
#[command(about = "Load required setup modules, then run spec files", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short = 'R', long, value_enum, default_value_t = ReporterKind::Spec, env = "PREFLIGHT_REPORTER")]
    pub reporter: ReporterKind,

    /// Module to load before any test runs (repeatable, loaded in order)
    #[arg(short = 'r', long = "require", value_name = "MODULE")]
    pub require: Vec<String>,

    /// Spec files or directories (default: test)
    #[arg(value_name = "SPEC")]
    pub specs: Vec<PathBuf>,

    /// Per-test timeout in milliseconds, 0 disables
    #[arg(short, long, value_name = "MS", default_value_t = DEFAULT_TIMEOUT.as_millis() as u64, env = "PREFLIGHT_TIMEOUT")]
    pub timeout: u64,

    /// Stop after the first test failure
    #[arg(short, long)]
    pub bail: bool,

    /// Only run tests whose full title contains PATTERN
    #[arg(short, long, value_name = "PATTERN")]
    pub grep: Option<String>,

    /// Invert --grep
    #[arg(short, long, requires = "grep")]
    pub invert: bool,

    /// Show module setup and test durations
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::new()
            .with_timeout_ms(self.timeout)
            .with_bail(self.bail)
            .with_invert(self.invert)
            .with_reporter(self.reporter)
            .with_verbose(self.verbose);
        if let Some(pattern) = &self.grep {
            config = config.with_grep(pattern.clone());
        }
        config
    }

    /// Positional paths, or the default spec directory.
    pub fn spec_paths(&self) -> Vec<PathBuf> {
        if self.specs.is_empty() {
            vec![PathBuf::from(discovery::DEFAULT_SPEC_DIR)]
        } else {
            self.specs.clone()
        }
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Run the harness for parsed arguments and return the exit code.
pub fn execute(cli: Cli) -> CliResult<ExitCode> {
    let config = cli.config();
    let specs = discovery::discover_spec_files(&cli.spec_paths())?;
    tracing::debug!(required = ?cli.require, specs = specs.len(), "starting run");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::failure(format!("Error: failed to start async runtime: {}", e)))?;

    let runner = HarnessRunner::new(config);
    let reporter = reporter::create_reporter(runner.config());
    let mut runner = runner.with_reporter(reporter);
    let outcome = runtime.block_on(runner.execute(&cli.require, &specs));

    render_errors(&outcome.errors);
    Ok(outcome.exit_code())
}

/// Print fatal errors to stderr; script errors get full source diagnostics.
fn render_errors(errors: &[HarnessError]) {
    for error in errors {
        match error {
            HarnessError::Load(load @ LoadError::Script { .. }) => {
                for diagnostic in load.diagnostics() {
                    eprintln!("{:?}", miette::Report::new(diagnostic));
                }
            }
            other => eprintln!("Error: {}", other),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
