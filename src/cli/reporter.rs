//! Console and JSON reporters
//!
//! `spec` and `dot` write human-readable output with ANSI colors when stdout is a terminal; `json` writes a single
//! document once the run completes. Write errors are logged and otherwise ignored.

use std::fmt::Display;
use std::io::{self, IsTerminal, Stdout, Write};
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::config::{HarnessConfig, ReporterKind};
use crate::harness::{HarnessError, RunSummary, TestInfo, TestReporter, TestResult};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[90m";
const RESET: &str = "\x1b[0m";

/// Build the reporter selected in `config`, writing to stdout.
pub fn create_reporter(config: &HarnessConfig) -> Box<dyn TestReporter> {
    match config.reporter {
        ReporterKind::Spec => Box::new(SpecReporter::new(config.verbose)),
        ReporterKind::Dot => Box::new(DotReporter::new()),
        ReporterKind::Json => Box::new(JsonReporter::new()),
    }
}

fn stdout_supports_color() -> bool {
    io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

#[derive(Debug, Clone, Copy)]
struct Palette {
    enabled: bool,
}

impl Palette {
    fn paint(self, color: &str, text: impl Display) -> String {
        if self.enabled {
            format!("{}{}{}", color, text, RESET)
        } else {
            text.to_string()
        }
    }
}

/// Failed tests, failed hooks and fatal errors, listed after the summary.
#[derive(Debug, Default)]
struct FailureLog {
    entries: Vec<(String, String)>,
}

impl FailureLog {
    /// Records a failure and returns its 1-based number.
    fn push(&mut self, title: String, message: String) -> usize {
        self.entries.push((title, message));
        self.entries.len()
    }

    fn write_epilogue(&self, out: &mut impl Write, palette: Palette, summary: &RunSummary) -> io::Result<()> {
        writeln!(out)?;
        writeln!(
            out,
            "  {} {}",
            palette.paint(GREEN, format!("{} passing", summary.passed)),
            palette.paint(DIM, format!("({}ms)", summary.duration.as_millis()))
        )?;
        if summary.skipped > 0 {
            writeln!(out, "  {}", palette.paint(CYAN, format!("{} pending", summary.skipped)))?;
        }
        if !self.entries.is_empty() {
            writeln!(out, "  {}", palette.paint(RED, format!("{} failing", self.entries.len())))?;
        }

        for (index, (title, message)) in self.entries.iter().enumerate() {
            writeln!(out)?;
            writeln!(out, "  {}) {}:", index + 1, title)?;
            for line in message.lines() {
                writeln!(out, "     {}", palette.paint(RED, line))?;
            }
        }
        writeln!(out)
    }
}

fn log_write_error(result: io::Result<()>) {
    if let Err(err) = result {
        tracing::warn!(error = %err, "failed to write test report");
    }
}

// ============================================================================
// Spec reporter
// ============================================================================

/// Hierarchical output: suite titles as headers, one line per test.
pub struct SpecReporter<W: Write + Send = Stdout> {
    out: W,
    palette: Palette,
    verbose: bool,
    /// Suite titles printed most recently
    open_suites: Vec<String>,
    failures: FailureLog,
}

impl SpecReporter<Stdout> {
    pub fn new(verbose: bool) -> Self {
        Self {
            out: io::stdout(),
            palette: Palette {
                enabled: stdout_supports_color(),
            },
            verbose,
            open_suites: Vec::new(),
            failures: FailureLog::default(),
        }
    }
}

impl<W: Write + Send> SpecReporter<W> {
    /// Uncolored reporter over any writer.
    pub fn with_writer(out: W, verbose: bool) -> Self {
        Self {
            out,
            palette: Palette { enabled: false },
            verbose,
            open_suites: Vec::new(),
            failures: FailureLog::default(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_headers(&mut self, suites: &[String]) -> io::Result<()> {
        let shared = self
            .open_suites
            .iter()
            .zip(suites)
            .take_while(|(open, next)| open == next)
            .count();
        for (depth, title) in suites.iter().enumerate().skip(shared) {
            writeln!(self.out, "{}{}", "  ".repeat(depth + 1), title)?;
        }
        self.open_suites = suites.to_vec();
        Ok(())
    }

    fn write_test(&mut self, test: &TestInfo, result: &TestResult) -> io::Result<()> {
        self.write_headers(&test.suites)?;
        let indent = "  ".repeat(test.suites.len() + 1);
        let palette = self.palette;
        match result {
            TestResult::Passed(duration) => {
                let timing = if self.verbose {
                    format!(" {}", palette.paint(DIM, format!("({}ms)", duration.as_millis())))
                } else {
                    String::new()
                };
                writeln!(self.out, "{}{} {}{}", indent, palette.paint(GREEN, "✓"), test.title, timing)
            }
            TestResult::Failed(_, message) => {
                let number = self.failures.push(test.full_title(), message.clone());
                writeln!(self.out, "{}{}", indent, palette.paint(RED, format!("{}) {}", number, test.title)))
            }
            TestResult::Skipped(reason) if reason.is_empty() || !self.verbose => {
                writeln!(self.out, "{}{}", indent, palette.paint(CYAN, format!("- {}", test.title)))
            }
            TestResult::Skipped(reason) => writeln!(
                self.out,
                "{}{}",
                indent,
                palette.paint(CYAN, format!("- {} ({})", test.title, reason))
            ),
        }
    }
}

impl<W: Write + Send> TestReporter for SpecReporter<W> {
    fn on_setup_complete(&mut self, module: &str, duration: Duration) {
        if self.verbose {
            let line = self
                .palette
                .paint(DIM, format!("  required {} ({}ms)", module, duration.as_millis()));
            log_write_error(writeln!(self.out, "{}", line));
        }
    }

    fn on_file_start(&mut self, _file: &Path, _test_count: usize) {
        self.open_suites.clear();
        log_write_error(writeln!(self.out));
    }

    fn on_test_complete(&mut self, test: &TestInfo, result: &TestResult) {
        let written = self.write_test(test, result);
        log_write_error(written);
    }

    fn on_error(&mut self, error: &HarnessError) {
        self.failures.push(error.title(), error.to_string());
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        let written = self.failures.write_epilogue(&mut self.out, self.palette, summary);
        log_write_error(written.and_then(|()| self.out.flush()));
    }
}

// ============================================================================
// Dot reporter
// ============================================================================

/// One character per test: `.` passed, `!` failed, `,` pending.
pub struct DotReporter<W: Write + Send = Stdout> {
    out: W,
    palette: Palette,
    failures: FailureLog,
    started: bool,
}

impl DotReporter<Stdout> {
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            palette: Palette {
                enabled: stdout_supports_color(),
            },
            failures: FailureLog::default(),
            started: false,
        }
    }
}

impl Default for DotReporter<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> DotReporter<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            palette: Palette { enabled: false },
            failures: FailureLog::default(),
            started: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> TestReporter for DotReporter<W> {
    fn on_test_complete(&mut self, test: &TestInfo, result: &TestResult) {
        let mark = match result {
            TestResult::Passed(_) => self.palette.paint(DIM, "."),
            TestResult::Failed(_, message) => {
                self.failures.push(test.full_title(), message.clone());
                self.palette.paint(RED, "!")
            }
            TestResult::Skipped(_) => self.palette.paint(CYAN, ","),
        };
        let prefix = if self.started { "" } else { "\n  " };
        self.started = true;
        log_write_error(write!(self.out, "{}{}", prefix, mark).and_then(|()| self.out.flush()));
    }

    fn on_error(&mut self, error: &HarnessError) {
        self.failures.push(error.title(), error.to_string());
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        let mut written = if self.started { writeln!(self.out) } else { Ok(()) };
        if written.is_ok() {
            written = self.failures.write_epilogue(&mut self.out, self.palette, summary);
        }
        log_write_error(written.and_then(|()| self.out.flush()));
    }
}

// ============================================================================
// JSON reporter
// ============================================================================

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    stats: JsonStats,
    tests: &'a [JsonTest],
    pending: &'a [JsonTest],
    failures: &'a [JsonTest],
    passes: &'a [JsonTest],
}

#[derive(Debug, Serialize)]
struct JsonStats {
    suites: usize,
    tests: usize,
    passes: usize,
    pending: usize,
    failures: usize,
    duration: u128,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonTest {
    title: String,
    full_title: String,
    file: String,
    duration: u128,
    err: JsonErr,
}

#[derive(Debug, Clone, Default, Serialize)]
struct JsonErr {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Collects results and writes one JSON document when the run completes.
pub struct JsonReporter<W: Write + Send = Stdout> {
    out: W,
    tests: Vec<JsonTest>,
    pending: Vec<JsonTest>,
    failures: Vec<JsonTest>,
    passes: Vec<JsonTest>,
}

impl JsonReporter<Stdout> {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for JsonReporter<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> JsonReporter<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            tests: Vec::new(),
            pending: Vec::new(),
            failures: Vec::new(),
            passes: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> TestReporter for JsonReporter<W> {
    fn on_test_complete(&mut self, test: &TestInfo, result: &TestResult) {
        let entry = JsonTest {
            title: test.title.clone(),
            full_title: test.full_title(),
            file: test.file.display().to_string(),
            duration: result.duration().as_millis(),
            err: match result {
                TestResult::Failed(_, message) => JsonErr {
                    message: Some(message.clone()),
                },
                _ => JsonErr::default(),
            },
        };
        if !test.hook {
            self.tests.push(entry.clone());
        }
        match result {
            TestResult::Passed(_) => self.passes.push(entry),
            TestResult::Failed(..) => self.failures.push(entry),
            TestResult::Skipped(_) => self.pending.push(entry),
        }
    }

    fn on_error(&mut self, error: &HarnessError) {
        self.failures.push(JsonTest {
            title: error.title(),
            full_title: error.title(),
            file: error.origin(),
            duration: 0,
            err: JsonErr {
                message: Some(error.to_string()),
            },
        });
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        let report = JsonReport {
            stats: JsonStats {
                suites: summary.suites,
                tests: self.tests.len(),
                passes: self.passes.len(),
                pending: self.pending.len(),
                failures: self.failures.len(),
                duration: summary.duration.as_millis(),
            },
            tests: &self.tests,
            pending: &self.pending,
            failures: &self.failures,
            passes: &self.passes,
        };
        let written = serde_json::to_writer_pretty(&mut self.out, &report)
            .map_err(io::Error::from)
            .and_then(|()| writeln!(self.out))
            .and_then(|()| self.out.flush());
        log_write_error(written);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::harness::StepError;

    fn info(suites: &[&str], title: &str) -> TestInfo {
        TestInfo::new(
            "test/async.spec.pf",
            suites.iter().map(|s| s.to_string()).collect(),
            title,
        )
    }

    fn summary(passed: usize, failed: usize, skipped: usize) -> RunSummary {
        RunSummary {
            suites: 1,
            passed,
            failed,
            skipped,
            errors: 0,
            duration: Duration::from_millis(12),
        }
    }

    #[test]
    fn test_spec_reporter_layout() {
        let mut reporter = SpecReporter::with_writer(Vec::new(), false);
        reporter.on_file_start(Path::new("test/async.spec.pf"), 3);
        reporter.on_test_complete(
            &info(&["Async requires"], "can do async work"),
            &TestResult::Passed(Duration::from_millis(1)),
        );
        reporter.on_test_complete(
            &info(&["Async requires"], "sees the seed"),
            &TestResult::Failed(Duration::ZERO, "expected `seed` to be set".into()),
        );
        reporter.on_test_complete(&info(&[], "later"), &TestResult::Skipped(String::new()));
        reporter.on_run_complete(&summary(1, 1, 1));

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let expected = "\n  Async requires\n    ✓ can do async work\n    1) sees the seed\n  - later\n\n  1 passing (12ms)\n  1 pending\n  1 failing\n\n  1) Async requires sees the seed:\n     expected `seed` to be set\n\n";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_spec_reporter_lists_harness_errors() {
        let mut reporter = SpecReporter::with_writer(Vec::new(), false);
        reporter.on_error(&HarnessError::Setup {
            module: "db.pf".into(),
            source: StepError::rejected("connection refused"),
        });
        reporter.on_run_complete(&summary(0, 0, 0));
        let output = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(output.contains("0 passing"));
        assert!(output.contains("1 failing"));
        assert!(output.contains("1) \"setup\" hook: db.pf:"));
        assert!(output.contains("required module 'db.pf' failed during setup: connection refused"));
    }

    #[test]
    fn test_spec_reporter_verbose_timings() {
        let mut reporter = SpecReporter::with_writer(Vec::new(), true);
        reporter.on_setup_complete("async-setup.pf", Duration::from_millis(10));
        reporter.on_test_complete(&info(&[], "fast"), &TestResult::Passed(Duration::from_millis(3)));
        let output = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(output.contains("required async-setup.pf (10ms)"));
        assert!(output.contains("✓ fast (3ms)"));
    }

    #[test]
    fn test_dot_reporter() {
        let mut reporter = DotReporter::with_writer(Vec::new());
        reporter.on_test_complete(&info(&[], "a"), &TestResult::Passed(Duration::ZERO));
        reporter.on_test_complete(&info(&[], "b"), &TestResult::Failed(Duration::ZERO, "boom".into()));
        reporter.on_test_complete(&info(&[], "c"), &TestResult::Skipped(String::new()));
        reporter.on_run_complete(&summary(1, 1, 1));
        let output = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(output.starts_with("\n  .!,\n"));
        assert!(output.contains("1) b:\n     boom"));
    }

    #[test]
    fn test_json_reporter_document() {
        let mut reporter = JsonReporter::with_writer(Vec::new());
        reporter.on_test_complete(
            &info(&["Async requires"], "can do async work"),
            &TestResult::Passed(Duration::from_millis(4)),
        );
        reporter.on_test_complete(
            &TestInfo::hook("test/async.spec.pf", vec![], "\"after all\" hook"),
            &TestResult::Failed(Duration::ZERO, "cleanup".into()),
        );
        reporter.on_run_complete(&summary(1, 1, 0));

        let output = reporter.into_inner();
        let doc: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(doc["stats"]["tests"], 1);
        assert_eq!(doc["stats"]["passes"], 1);
        assert_eq!(doc["stats"]["failures"], 1);
        assert_eq!(doc["stats"]["duration"], 12);
        assert_eq!(doc["passes"][0]["fullTitle"], "Async requires can do async work");
        assert_eq!(doc["passes"][0]["err"], serde_json::json!({}));
        assert_eq!(doc["failures"][0]["err"]["message"], "cleanup");
    }

    #[test]
    fn test_json_reporter_includes_harness_errors() {
        let mut reporter = JsonReporter::with_writer(Vec::new());
        reporter.on_error(&HarnessError::Setup {
            module: "broken.pf".into(),
            source: StepError::rejected("nope"),
        });
        reporter.on_run_complete(&RunSummary::default());
        let doc: serde_json::Value = serde_json::from_slice(&reporter.into_inner()).unwrap();
        assert_eq!(doc["stats"]["tests"], 0);
        assert_eq!(doc["failures"][0]["title"], "\"setup\" hook: broken.pf");
        assert_eq!(doc["failures"][0]["file"], "broken.pf");
    }

    #[test]
    fn test_create_reporter_for_each_kind() {
        for kind in [ReporterKind::Spec, ReporterKind::Dot, ReporterKind::Json] {
            let config = HarnessConfig::new().with_reporter(kind);
            let _reporter = create_reporter(&config);
        }
    }
}
