#![forbid(unsafe_code)]
//! preflight: a require-then-run test harness
//!
//! Required setup modules load strictly in order, each awaited to completion, before any test runs. The process exit
//! code is 0 only if every module set up successfully and every test passed; a failing setup aborts the run before
//! the first test.
//!
//! Modules and tests are written in `.pf` scripts (see [`frontend`]), or registered in-process as
//! [`harness::FnModule`]s.
//!
//! ```rust,no_run
//! use preflight::config::HarnessConfig;
//! use preflight::harness::{FnModule, HarnessRunner, ModuleRegistry};
//!
//! # async fn demo() {
//! let mut registry = ModuleRegistry::new();
//! registry.register(FnModule::new("db", |ctx| {
//!     Box::pin(async move {
//!         ctx.set("db.ready", true);
//!         Ok(())
//!     })
//! }));
//!
//! let mut runner = HarnessRunner::new(HarnessConfig::default()).with_loader(registry);
//! let code = runner.run(&["db".to_string()], &["test/db.spec.pf".into()]).await;
//! std::process::exit(code.0);
//! # }
//! ```
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and `harness` modules
//!   enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Module code**: a panic inside a setup or teardown future is caught by the runner and reported as a failure of
//!   that module.

pub mod cli;
pub mod config;
pub mod frontend;
pub mod harness;

pub use config::{HarnessConfig, ReporterKind};
pub use frontend::{ast, diagnostics, lexer, parser};
pub use harness::{ExitCode, HarnessRunner, RunContext, SetupModule, Value};
