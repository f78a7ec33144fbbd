//! Harness configuration
//!
//! Defaults follow the conventions of JavaScript-style spec runners: a 2 second per-test timeout, no bail, the
//! `spec` reporter.

use std::fmt;
use std::time::Duration;

/// Default per-test (and per-hook) timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReporterKind {
    /// Hierarchical, one line per test
    #[default]
    Spec,
    /// One character per test
    Dot,
    /// Single JSON document on stdout
    Json,
}

impl fmt::Display for ReporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReporterKind::Spec => write!(f, "spec"),
            ReporterKind::Dot => write!(f, "dot"),
            ReporterKind::Json => write!(f, "json"),
        }
    }
}

/// Harness configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    /// Limit for each test body and each `before:`/`after:` hook; `None` disables it
    pub timeout: Option<Duration>,
    /// Stop running tests after the first failure
    pub bail: bool,
    /// Only run tests whose full title contains this pattern
    pub grep: Option<String>,
    /// Invert the `grep` match
    pub invert: bool,
    pub reporter: ReporterKind,
    /// Include durations in console output
    pub verbose: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            bail: false,
            grep: None,
            invert: false,
            reporter: ReporterKind::default(),
            verbose: false,
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout in milliseconds; `0` disables it.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = (ms > 0).then(|| Duration::from_millis(ms));
        self
    }

    pub fn with_bail(mut self, bail: bool) -> Self {
        self.bail = bail;
        self
    }

    pub fn with_grep(mut self, pattern: impl Into<String>) -> Self {
        self.grep = Some(pattern.into());
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn with_reporter(mut self, reporter: ReporterKind) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Whether a test with this full title passes the `grep`/`invert` filter.
    pub fn matches_grep(&self, full_title: &str) -> bool {
        match &self.grep {
            Some(pattern) => full_title.contains(pattern.as_str()) != self.invert,
            None => true,
        }
    }
}
