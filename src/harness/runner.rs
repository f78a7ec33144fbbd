//! Require-then-run orchestration
//!
//! A run has three phases:
//!
//! 1. **Load**: every spec file is parsed and every required module is resolved. Nothing executes yet, so a typo in
//!    a path never leaves half-initialized fixtures behind.
//! 2. **Setup**: required modules run their setup one at a time, in command-line order. Each setup future is awaited
//!    to completion before the next module starts. The first failure (an `Err` or a panic) aborts the run and no test
//!    executes.
//! 3. **Tests**, then **teardown** of every module that reached `Ready`, in reverse order.
//!
//! The run passes only if every phase succeeds and no test or suite hook failed.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;

use super::context::RunContext;
use super::error::{HarnessError, StepError};
use super::loader::{ChainLoader, ModuleLoader};
use super::module::{ModuleState, SetupModule};
use super::report::{NullReporter, RunSummary, TestReporter};
use super::suite::{SpecFile, SuiteExecutor, load_spec_files, selected_test_count};
use crate::config::HarnessConfig;

/// Process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Passed,
    Failed,
}

/// Where a required module ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub id: String,
    pub state: ModuleState,
}

/// Everything a run produced
#[derive(Debug)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub summary: RunSummary,
    /// Required modules in command-line order
    pub modules: Vec<ModuleRecord>,
    /// Fatal errors, in the order they occurred
    pub errors: Vec<HarnessError>,
}

impl RunOutcome {
    pub fn exit_code(&self) -> ExitCode {
        match self.status {
            RunStatus::Passed => ExitCode::SUCCESS,
            RunStatus::Failed => ExitCode::FAILURE,
        }
    }

    pub fn state_of(&self, id: &str) -> Option<ModuleState> {
        self.modules.iter().find(|record| record.id == id).map(|record| record.state)
    }
}

struct LoadedModule {
    module: Arc<dyn SetupModule>,
    record: usize,
}

/// Loads required modules, then runs tests.
pub struct HarnessRunner {
    config: HarnessConfig,
    loader: Box<dyn ModuleLoader>,
    reporter: Box<dyn TestReporter>,
}

impl HarnessRunner {
    /// Runner with the default loader (registry, then module files) and no output.
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            loader: Box::new(ChainLoader::default()),
            reporter: Box::new(NullReporter),
        }
    }

    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn with_reporter(mut self, reporter: Box<dyn TestReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run and map the verdict to an exit code.
    pub async fn run(&mut self, required: &[String], specs: &[PathBuf]) -> ExitCode {
        self.execute(required, specs).await.exit_code()
    }

    /// Run and return the full outcome.
    #[tracing::instrument(skip_all, fields(modules = required.len(), specs = specs.len()))]
    pub async fn execute(&mut self, required: &[String], specs: &[PathBuf]) -> RunOutcome {
        let started = Instant::now();
        let mut outcome = RunOutcome {
            status: RunStatus::Failed,
            summary: RunSummary::default(),
            modules: required
                .iter()
                .map(|id| ModuleRecord {
                    id: id.clone(),
                    state: ModuleState::Registered,
                })
                .collect(),
            errors: Vec::new(),
        };

        match self.load(required, specs) {
            Ok((modules, spec_files)) => {
                let mut ctx = RunContext::new();
                let ready = self.setup_all(&modules, &mut ctx, &mut outcome).await;
                if ready.len() == modules.len() {
                    SuiteExecutor::new(&self.config, self.reporter.as_mut())
                        .run(&spec_files, &mut ctx, &mut outcome.summary)
                        .await;
                }
                self.teardown_all(&ready, &mut ctx, &mut outcome).await;
            }
            Err(err) => self.record_error(err, &mut outcome),
        }

        outcome.summary.errors = outcome.errors.len();
        outcome.summary.duration = started.elapsed();
        if outcome.errors.is_empty() && outcome.summary.failed == 0 {
            outcome.status = RunStatus::Passed;
        }
        tracing::info!(
            status = ?outcome.status,
            passed = outcome.summary.passed,
            failed = outcome.summary.failed,
            errors = outcome.summary.errors,
            "run complete"
        );
        self.reporter.on_run_complete(&outcome.summary);
        outcome
    }

    fn load(
        &self,
        required: &[String],
        specs: &[PathBuf],
    ) -> Result<(Vec<LoadedModule>, Vec<SpecFile>), HarnessError> {
        let spec_files = load_spec_files(specs)?;
        tracing::debug!(
            declared = spec_files.iter().map(|spec| spec.script.test_count()).sum::<usize>(),
            selected = selected_test_count(&spec_files, &self.config),
            "spec files loaded"
        );
        let modules = required
            .iter()
            .enumerate()
            .map(|(record, id)| {
                self.loader
                    .load(id)
                    .map(|module| LoadedModule { module, record })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((modules, spec_files))
    }

    /// Set up modules in order until one fails. Returns the ones that became ready.
    async fn setup_all<'m>(
        &mut self,
        modules: &'m [LoadedModule],
        ctx: &mut RunContext,
        outcome: &mut RunOutcome,
    ) -> Vec<&'m LoadedModule> {
        let mut ready = Vec::with_capacity(modules.len());
        for loaded in modules {
            let name = loaded.module.name().to_string();
            outcome.modules[loaded.record].state = ModuleState::Loading;
            self.reporter.on_setup_start(&name);
            ctx.enter_scope(name.clone());

            let started = Instant::now();
            let result = guard(loaded.module.setup(ctx)).await;
            match result {
                Ok(()) => {
                    tracing::debug!(module = %name, elapsed = ?started.elapsed(), "module ready");
                    outcome.modules[loaded.record].state = ModuleState::Ready;
                    self.reporter.on_setup_complete(&name, started.elapsed());
                    ready.push(loaded);
                }
                Err(source) => {
                    tracing::debug!(module = %name, error = %source, "module setup failed");
                    outcome.modules[loaded.record].state = ModuleState::Failed;
                    self.record_error(HarnessError::Setup { module: name, source }, outcome);
                    break;
                }
            }
        }
        ready
    }

    async fn teardown_all(&mut self, ready: &[&LoadedModule], ctx: &mut RunContext, outcome: &mut RunOutcome) {
        for loaded in ready.iter().rev() {
            let name = loaded.module.name().to_string();
            ctx.enter_scope(name.clone());
            if let Err(source) = guard(loaded.module.teardown(ctx)).await {
                self.record_error(HarnessError::Teardown { module: name, source }, outcome);
            }
        }
    }

    fn record_error(&mut self, error: HarnessError, outcome: &mut RunOutcome) {
        tracing::debug!(error = %error, "fatal harness error");
        self.reporter.on_error(&error);
        outcome.errors.push(error);
    }
}

/// Await a module future, turning a panic into a step error.
async fn guard<F>(future: F) -> Result<(), StepError>
where
    F: std::future::Future<Output = Result<(), StepError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(StepError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::harness::{FnModule, LoadError, ModuleRegistry};

    fn registry(modules: Vec<FnModule>) -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        for module in modules {
            registry.register(module);
        }
        registry
    }

    fn ok_module(name: &'static str) -> FnModule {
        FnModule::new(name, move |ctx| {
            Box::pin(async move {
                ctx.set(format!("{}.ready", name), true);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn test_no_modules_no_specs_passes() {
        let mut runner = HarnessRunner::new(HarnessConfig::default());
        let outcome = runner.execute(&[], &[]).await;
        assert_eq!(outcome.status, RunStatus::Passed);
        assert_eq!(outcome.exit_code(), ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn test_unknown_module_fails_without_setup() {
        let mut runner =
            HarnessRunner::new(HarnessConfig::default()).with_loader(registry(vec![ok_module("a")]));
        let outcome = runner.execute(&["a".into(), "missing".into()], &[]).await;
        assert_eq!(outcome.status, RunStatus::Failed);
        // resolution happens before any setup
        assert_eq!(outcome.state_of("a"), Some(ModuleState::Registered));
        assert!(matches!(
            outcome.errors.as_slice(),
            [HarnessError::Load(LoadError::ModuleNotFound(id))] if id == "missing"
        ));
    }

    #[tokio::test]
    async fn test_setup_rejection_stops_later_modules() {
        let rejecting = FnModule::new("broken", |_ctx| Box::pin(async { Err(StepError::rejected("nope")) }));
        let mut runner = HarnessRunner::new(HarnessConfig::default())
            .with_loader(registry(vec![ok_module("a"), rejecting, ok_module("c")]));
        let outcome = runner
            .execute(&["a".into(), "broken".into(), "c".into()], &[])
            .await;
        assert_eq!(outcome.exit_code(), ExitCode::FAILURE);
        assert_eq!(outcome.state_of("a"), Some(ModuleState::Ready));
        assert_eq!(outcome.state_of("broken"), Some(ModuleState::Failed));
        assert_eq!(outcome.state_of("c"), Some(ModuleState::Registered));
        assert_eq!(outcome.errors[0].title(), "\"setup\" hook: broken");
    }

    #[tokio::test]
    async fn test_panic_in_setup_is_a_failure() {
        let panicking = FnModule::new("panics", |_ctx| {
            Box::pin(async {
                if true {
                    panic!("exploded");
                }
                Ok(())
            })
        });
        let mut runner = HarnessRunner::new(HarnessConfig::default()).with_loader(registry(vec![panicking]));
        let outcome = runner.execute(&["panics".into()], &[]).await;
        match outcome.errors.as_slice() {
            [HarnessError::Setup { source: StepError::Panicked(message), .. }] => assert_eq!(message, "exploded"),
            other => panic!("unexpected errors: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_teardown_reverse_order_for_ready_modules_only() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let tracked = |name: &'static str, fail: bool| {
            let order = Arc::clone(&order);
            FnModule::new(name, move |_ctx| {
                Box::pin(async move {
                    if fail { Err(StepError::rejected("down")) } else { Ok(()) }
                })
            })
            .with_teardown(move |_ctx| {
                let order = Arc::clone(&order);
                Box::pin(async move {
                    order.lock().unwrap().push(name);
                    Ok(())
                })
            })
        };
        let loader = registry(vec![tracked("a", false), tracked("b", false), tracked("c", true)]);
        let mut runner = HarnessRunner::new(HarnessConfig::default()).with_loader(loader);
        runner
            .execute(&["a".into(), "b".into(), "c".into()], &[])
            .await;
        assert_eq!(*order.lock().unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_teardown_failure_fails_run() {
        let module = FnModule::new("a", |_ctx| Box::pin(async { Ok(()) }))
            .with_teardown(|_ctx| Box::pin(async { Err(StepError::rejected("leak")) }));
        let mut runner = HarnessRunner::new(HarnessConfig::default()).with_loader(registry(vec![module]));
        let outcome = runner.execute(&["a".into()], &[]).await;
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.state_of("a"), Some(ModuleState::Ready));
        assert!(matches!(outcome.errors[0], HarnessError::Teardown { .. }));
    }

    #[tokio::test]
    async fn test_missing_spec_is_fatal_before_setup() {
        let ran = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran);
        let module = FnModule::new("a", move |_ctx| {
            let flag = Arc::clone(&flag);
            Box::pin(async move {
                *flag.lock().unwrap() = true;
                Ok(())
            })
        });
        let mut runner = HarnessRunner::new(HarnessConfig::default()).with_loader(registry(vec![module]));
        let code = runner
            .run(&["a".into()], &[PathBuf::from("no/such/file.spec.pf")])
            .await;
        assert_eq!(code, ExitCode::FAILURE);
        assert!(!*ran.lock().unwrap());
    }

    #[test]
    fn test_panic_message_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
