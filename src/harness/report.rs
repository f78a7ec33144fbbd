//! Reporting boundary
//!
//! The runner announces what happens through [`TestReporter`]; output formats live in `cli::reporter`. Reporters
//! only observe: nothing they do changes the run's exit code.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::HarnessError;

/// Identity of a reported entry (a test, or a suite-level hook that failed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestInfo {
    pub file: PathBuf,
    /// Enclosing `describe` titles, outermost first
    pub suites: Vec<String>,
    pub title: String,
    /// `true` for `"before all"`/`"after all"` hook entries
    pub hook: bool,
}

impl TestInfo {
    pub fn new(file: impl Into<PathBuf>, suites: Vec<String>, title: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            suites,
            title: title.into(),
            hook: false,
        }
    }

    pub fn hook(file: impl Into<PathBuf>, suites: Vec<String>, title: impl Into<String>) -> Self {
        Self {
            hook: true,
            ..Self::new(file, suites, title)
        }
    }

    /// Suite titles and the test title joined by spaces.
    pub fn full_title(&self) -> String {
        let mut parts: Vec<&str> = self.suites.iter().map(String::as_str).collect();
        parts.push(&self.title);
        parts.join(" ")
    }
}

/// Result of running a single test
#[derive(Debug, Clone, PartialEq)]
pub enum TestResult {
    Passed(Duration),
    Failed(Duration, String),
    Skipped(String),
}

impl TestResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, TestResult::Failed(..))
    }

    pub fn duration(&self) -> Duration {
        match self {
            TestResult::Passed(d) | TestResult::Failed(d, _) => *d,
            TestResult::Skipped(_) => Duration::ZERO,
        }
    }
}

/// Summary of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub suites: usize,
    pub passed: usize,
    /// Failed tests and failed suite hooks
    pub failed: usize,
    pub skipped: usize,
    /// Fatal harness errors (load, setup, teardown)
    pub errors: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}

/// Receives run events in order.
pub trait TestReporter: Send {
    /// A required module is about to load
    fn on_setup_start(&mut self, _module: &str) {}

    /// A required module finished its setup successfully
    fn on_setup_complete(&mut self, _module: &str, _duration: Duration) {}

    /// A spec file's tests are about to run
    fn on_file_start(&mut self, _file: &Path, _test_count: usize) {}

    fn on_test_start(&mut self, _test: &TestInfo) {}

    fn on_test_complete(&mut self, test: &TestInfo, result: &TestResult);

    /// A fatal harness error (load, setup or teardown failure)
    fn on_error(&mut self, _error: &HarnessError) {}

    fn on_run_complete(&mut self, summary: &RunSummary);
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl TestReporter for NullReporter {
    fn on_test_complete(&mut self, _test: &TestInfo, _result: &TestResult) {}

    fn on_run_complete(&mut self, _summary: &RunSummary) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_title_joins_suites() {
        let info = TestInfo::new(
            "a.spec.pf",
            vec!["Async requires".into(), "db".into()],
            "is seeded",
        );
        assert_eq!(info.full_title(), "Async requires db is seeded");
        assert!(!info.hook);
    }

    #[test]
    fn test_full_title_without_suites() {
        assert_eq!(TestInfo::new("a", vec![], "alone").full_title(), "alone");
    }

    #[test]
    fn test_hook_entry() {
        let info = TestInfo::hook("a", vec![], "\"before all\" hook");
        assert!(info.hook);
    }

    #[test]
    fn test_summary_total() {
        let summary = RunSummary {
            passed: 2,
            failed: 1,
            skipped: 3,
            ..RunSummary::default()
        };
        assert_eq!(summary.total(), 6);
    }

    #[test]
    fn test_result_helpers() {
        let failed = TestResult::Failed(Duration::from_millis(5), "x".into());
        assert!(failed.is_failure());
        assert_eq!(failed.duration(), Duration::from_millis(5));
        assert_eq!(TestResult::Skipped(String::new()).duration(), Duration::ZERO);
    }
}
