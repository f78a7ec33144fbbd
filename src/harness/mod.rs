//! The require-then-run harness
//!
//! - [`context`]: shared state written by setup modules and read by tests
//! - [`module`]: the [`SetupModule`] trait and its script/closure implementations
//! - [`loader`]: resolving `--require` identifiers
//! - [`step`]: the step interpreter
//! - [`suite`]: spec files, selection and test execution
//! - [`runner`]: the three-phase run and its exit code
//! - [`report`]: the reporter boundary

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod context;
pub mod error;
pub mod loader;
pub mod module;
pub mod report;
pub mod runner;
pub mod step;
pub mod suite;

pub use context::{RunContext, Value};
pub use error::{HarnessError, LoadError, StepError};
pub use loader::{ChainLoader, ModuleLoader, ModuleRegistry, ScriptLoader};
pub use module::{FnModule, HookFn, ModuleState, ScriptModule, SetupModule};
pub use report::{NullReporter, RunSummary, TestInfo, TestReporter, TestResult};
pub use runner::{ExitCode, HarnessRunner, ModuleRecord, RunOutcome, RunStatus};
pub use suite::{SpecFile, SuiteExecutor, load_spec_files, selected_test_count};
