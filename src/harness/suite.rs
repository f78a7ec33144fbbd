//! Spec files and test execution
//!
//! Spec files are parsed up front (before any module setup runs). Execution then walks a flat plan built from every
//! file's suite tree: `Enter` runs a suite's `before:` hooks, `Test` runs one test body, `Leave` runs `after:` hooks.
//! Suites without any selected test never appear in the plan, so their hooks never run.

use std::fs;
use std::path::{Path, PathBuf};

use preflight_syntax::ast::{Block, TestDecl};
use tokio::time::Instant;

use super::context::RunContext;
use super::error::{LoadError, StepError};
use super::report::{RunSummary, TestInfo, TestReporter, TestResult};
use super::step::run_block;
use crate::config::HarnessConfig;
use crate::frontend::{SpecScript, SuiteNode, parse_spec};

const BEFORE_ALL: &str = "\"before all\" hook";
const AFTER_ALL: &str = "\"after all\" hook";

/// A parsed spec file
#[derive(Debug, Clone)]
pub struct SpecFile {
    pub path: PathBuf,
    pub script: SpecScript,
}

impl SpecFile {
    /// Read and parse a spec file.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::SpecNotFound(path.to_path_buf()));
        }
        let source_text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let script = parse_spec(&source_text).map_err(|errors| LoadError::Script {
            path: path.to_path_buf(),
            source_text: source_text.clone(),
            errors,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            script,
        })
    }

    /// Parse a spec from memory; `path` is only used for reporting.
    pub fn from_source(path: impl Into<PathBuf>, source_text: &str) -> Result<Self, LoadError> {
        let path = path.into();
        let script = parse_spec(source_text).map_err(|errors| LoadError::Script {
            path: path.clone(),
            source_text: source_text.to_string(),
            errors,
        })?;
        Ok(Self { path, script })
    }
}

/// Load every spec file, stopping at the first one that fails.
#[tracing::instrument(skip_all, fields(files = paths.len()))]
pub fn load_spec_files(paths: &[PathBuf]) -> Result<Vec<SpecFile>, LoadError> {
    paths.iter().map(|path| SpecFile::load(path)).collect()
}

// ============================================================================
// Planning
// ============================================================================

#[derive(Debug)]
enum PlanEntry<'s> {
    Enter {
        file: &'s Path,
        suites: Vec<String>,
        before: &'s [Block],
        /// Selected tests in this file; only set on a file's root suite
        file_tests: Option<usize>,
    },
    Test {
        info: TestInfo,
        decl: &'s TestDecl,
    },
    Leave {
        file: &'s Path,
        suites: Vec<String>,
        after: &'s [Block],
    },
}

struct Selection<'c> {
    config: &'c HarnessConfig,
    any_only: bool,
}

impl Selection<'_> {
    fn selects(&self, decl: &TestDecl, info: &TestInfo) -> bool {
        if self.any_only && !decl.is_only() {
            return false;
        }
        self.config.matches_grep(&info.full_title())
    }
}

fn has_only(suite: &SuiteNode) -> bool {
    suite.tests.iter().any(TestDecl::is_only) || suite.children.iter().any(has_only)
}

/// Returns the suite's plan entries and how many tests they select.
fn plan_suite<'s>(
    file: &'s Path,
    suite: &'s SuiteNode,
    titles: &mut Vec<String>,
    selection: &Selection<'_>,
) -> (Vec<PlanEntry<'s>>, usize) {
    if let Some(title) = &suite.title {
        titles.push(title.clone());
    }

    let mut inner = Vec::new();
    let mut selected = 0;
    for decl in &suite.tests {
        let info = TestInfo::new(file, titles.clone(), decl.title.clone());
        if selection.selects(decl, &info) {
            inner.push(PlanEntry::Test { info, decl });
            selected += 1;
        }
    }
    for child in &suite.children {
        let (entries, count) = plan_suite(file, child, titles, selection);
        inner.extend(entries);
        selected += count;
    }

    let suites = titles.clone();
    if suite.title.is_some() {
        titles.pop();
    }
    if selected == 0 {
        return (Vec::new(), 0);
    }

    let mut entries = Vec::with_capacity(inner.len() + 2);
    entries.push(PlanEntry::Enter {
        file,
        suites: suites.clone(),
        before: &suite.before,
        file_tests: suite.title.is_none().then_some(selected),
    });
    entries.extend(inner);
    entries.push(PlanEntry::Leave {
        file,
        suites,
        after: &suite.after,
    });
    (entries, selected)
}

fn build_plan<'s>(specs: &'s [SpecFile], config: &HarnessConfig) -> Vec<PlanEntry<'s>> {
    let selection = Selection {
        config,
        any_only: specs.iter().any(|spec| has_only(&spec.script.root)),
    };
    let mut plan = Vec::new();
    for spec in specs {
        let (entries, _) = plan_suite(&spec.path, &spec.script.root, &mut Vec::new(), &selection);
        plan.extend(entries);
    }
    plan
}

/// Number of tests a run over `specs` will report (after `only`/`grep` selection).
pub fn selected_test_count(specs: &[SpecFile], config: &HarnessConfig) -> usize {
    build_plan(specs, config)
        .iter()
        .filter(|entry| matches!(entry, PlanEntry::Test { .. }))
        .count()
}

// ============================================================================
// Execution
// ============================================================================

struct Frame {
    /// `before:` ran (or was attempted), so `after:` must run
    entered: bool,
    /// A `before:` hook failed here or in an enclosing suite
    blocked: bool,
}

/// Runs the tests of already-loaded spec files.
pub struct SuiteExecutor<'r> {
    config: &'r HarnessConfig,
    reporter: &'r mut dyn TestReporter,
    bailed: bool,
}

impl<'r> SuiteExecutor<'r> {
    pub fn new(config: &'r HarnessConfig, reporter: &'r mut dyn TestReporter) -> Self {
        Self {
            config,
            reporter,
            bailed: false,
        }
    }

    /// Run every selected test, accumulating counts into `summary`.
    #[tracing::instrument(skip_all, fields(files = specs.len()))]
    pub async fn run(&mut self, specs: &[SpecFile], ctx: &mut RunContext, summary: &mut RunSummary) {
        let plan = build_plan(specs, self.config);
        let mut stack: Vec<Frame> = Vec::new();

        for entry in &plan {
            match entry {
                PlanEntry::Enter {
                    file,
                    suites,
                    before,
                    file_tests,
                } => {
                    if self.bailed || stack.last().is_some_and(|frame| frame.blocked) {
                        stack.push(Frame {
                            entered: false,
                            blocked: true,
                        });
                        continue;
                    }
                    if let Some(count) = file_tests {
                        self.reporter.on_file_start(file, *count);
                    }
                    summary.suites += 1;
                    ctx.enter_scope(file.display().to_string());

                    let blocked = !self.run_hooks(before, file, suites, BEFORE_ALL, ctx, summary).await;
                    stack.push(Frame { entered: true, blocked });
                }
                PlanEntry::Test { info, decl } => {
                    if self.bailed || stack.last().is_some_and(|frame| frame.blocked) {
                        continue;
                    }
                    self.reporter.on_test_start(info);
                    let result = match decl.skip_reason() {
                        Some(reason) => TestResult::Skipped(reason),
                        None => {
                            ctx.enter_scope(info.file.display().to_string());
                            match self.run_timed(&decl.body, ctx).await {
                                (elapsed, Ok(())) => TestResult::Passed(elapsed),
                                (elapsed, Err(err)) => TestResult::Failed(elapsed, err.to_string()),
                            }
                        }
                    };
                    match &result {
                        TestResult::Passed(_) => summary.passed += 1,
                        TestResult::Failed(..) => summary.failed += 1,
                        TestResult::Skipped(_) => summary.skipped += 1,
                    }
                    if result.is_failure() {
                        self.bailed = self.config.bail;
                    }
                    tracing::debug!(test = %info.full_title(), ?result, "test finished");
                    self.reporter.on_test_complete(info, &result);
                }
                PlanEntry::Leave { file, suites, after } => {
                    let entered = stack.pop().is_some_and(|frame| frame.entered);
                    if entered {
                        self.run_hooks(after, file, suites, AFTER_ALL, ctx, summary).await;
                    }
                }
            }
        }
    }

    /// Run suite hooks in order; a failure is reported as a failed hook entry. Returns `true` if all passed.
    async fn run_hooks(
        &mut self,
        hooks: &[Block],
        file: &Path,
        suites: &[String],
        title: &str,
        ctx: &mut RunContext,
        summary: &mut RunSummary,
    ) -> bool {
        for hook in hooks {
            let (elapsed, result) = self.run_timed(hook, ctx).await;
            if let Err(err) = result {
                let info = TestInfo::hook(file, suites.to_vec(), title);
                tracing::debug!(hook = %info.full_title(), error = %err, "suite hook failed");
                summary.failed += 1;
                self.bailed = self.config.bail;
                self.reporter
                    .on_test_complete(&info, &TestResult::Failed(elapsed, err.to_string()));
                return false;
            }
        }
        true
    }

    async fn run_timed(&self, block: &Block, ctx: &mut RunContext) -> (std::time::Duration, Result<(), StepError>) {
        let start = Instant::now();
        let result = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, run_block(block, ctx)).await {
                Ok(result) => result,
                Err(_) => Err(StepError::Timeout(limit.as_millis())),
            },
            None => run_block(block, ctx).await,
        };
        (start.elapsed(), result)
    }
}
