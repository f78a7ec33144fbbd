//! In-process tests of the require-then-run contract.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use preflight::config::HarnessConfig;
use preflight::harness::{
    ChainLoader, FnModule, HarnessError, HarnessRunner, ModuleRegistry, ModuleState, RunStatus, RunSummary,
    ScriptLoader, StepError, TestInfo, TestReporter, TestResult,
};

type Events = Arc<Mutex<Vec<String>>>;

/// Records reporter events as strings.
struct EventLog(Events);

impl TestReporter for EventLog {
    fn on_setup_start(&mut self, module: &str) {
        self.0.lock().unwrap().push(format!("setup:{}", module));
    }

    fn on_setup_complete(&mut self, module: &str, _duration: Duration) {
        self.0.lock().unwrap().push(format!("ready:{}", module));
    }

    fn on_file_start(&mut self, file: &Path, test_count: usize) {
        let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        self.0.lock().unwrap().push(format!("file:{}:{}", name, test_count));
    }

    fn on_test_complete(&mut self, test: &TestInfo, result: &TestResult) {
        let verdict = match result {
            TestResult::Passed(_) => "pass",
            TestResult::Failed(..) => "fail",
            TestResult::Skipped(_) => "skip",
        };
        self.0.lock().unwrap().push(format!("{}:{}", verdict, test.full_title()));
    }

    fn on_error(&mut self, error: &HarnessError) {
        self.0.lock().unwrap().push(format!("error:{}", error.title()));
    }

    fn on_run_complete(&mut self, summary: &RunSummary) {
        self.0.lock().unwrap().push(format!("done:{}/{}", summary.passed, summary.total()));
    }
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn fixtures_loader(registry: ModuleRegistry) -> ChainLoader {
    ChainLoader::new(registry, ScriptLoader::new().with_base_dir(fixture("")))
}

fn runner_with_log(registry: ModuleRegistry) -> (HarnessRunner, Events) {
    let events = Events::default();
    let runner = HarnessRunner::new(HarnessConfig::default())
        .with_loader(fixtures_loader(registry))
        .with_reporter(Box::new(EventLog(Arc::clone(&events))));
    (runner, events)
}

fn events(log: &Events) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn async_script_module_then_spec() {
    let (mut runner, log) = runner_with_log(ModuleRegistry::new());
    let outcome = runner
        .execute(&["async-setup.pf".into()], &[fixture("async-setup.spec.pf")])
        .await;

    assert_eq!(outcome.status, RunStatus::Passed);
    assert_eq!(outcome.state_of("async-setup.pf"), Some(ModuleState::Ready));
    assert_eq!(
        events(&log),
        vec![
            "setup:async-setup.pf",
            "ready:async-setup.pf",
            "file:async-setup.spec.pf:1",
            "pass:Async requires can do async work",
            "done:1/1",
        ]
    );
}

#[tokio::test]
async fn in_process_module_awaited_before_tests() {
    let mut registry = ModuleRegistry::new();
    registry.register(FnModule::new("slow-flag", |ctx| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            ctx.set("ready", true);
            Ok(())
        })
    }));
    let (mut runner, _log) = runner_with_log(registry);
    let outcome = runner
        .execute(&["slow-flag".into()], &[fixture("async-setup.spec.pf")])
        .await;
    assert_eq!(outcome.status, RunStatus::Passed);
    assert_eq!(outcome.summary.passed, 1);
}

#[tokio::test]
async fn rejected_setup_runs_no_test() {
    let (mut runner, log) = runner_with_log(ModuleRegistry::new());
    let outcome = runner
        .execute(&["async-setup-reject.pf".into()], &[fixture("async-setup.spec.pf")])
        .await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.summary.total(), 0);
    assert_eq!(outcome.state_of("async-setup-reject.pf"), Some(ModuleState::Failed));
    let log = events(&log);
    assert!(!log.iter().any(|event| event.starts_with("pass:") || event.starts_with("fail:")));
    assert!(log.contains(&"error:\"setup\" hook: async-setup-reject.pf".to_string()));
}

#[tokio::test]
async fn ordering_is_observable() {
    let (mut runner, _) = runner_with_log(ModuleRegistry::new());
    let forward = runner
        .execute(&["order-a.pf".into(), "order-b.pf".into()], &[fixture("ordering.spec.pf")])
        .await;
    assert_eq!(forward.status, RunStatus::Passed);

    let backward = runner
        .execute(&["order-b.pf".into(), "order-a.pf".into()], &[fixture("ordering.spec.pf")])
        .await;
    assert_eq!(backward.status, RunStatus::Failed);
    assert_eq!(backward.state_of("order-b.pf"), Some(ModuleState::Failed));
    assert_eq!(backward.state_of("order-a.pf"), Some(ModuleState::Registered));
}

#[tokio::test]
async fn each_run_starts_from_an_empty_context() {
    let counter = Arc::new(Mutex::new(0));
    let mut registry = ModuleRegistry::new();
    let seen = Arc::clone(&counter);
    registry.register(FnModule::new("once", move |ctx| {
        let seen = Arc::clone(&seen);
        Box::pin(async move {
            if ctx.contains("once.ran") {
                return Err(StepError::rejected("state leaked between runs"));
            }
            *seen.lock().unwrap() += 1;
            ctx.set("once.ran", true);
            Ok(())
        })
    }));
    let (mut runner, _) = runner_with_log(registry);

    let first = runner.execute(&["once".into()], &[]).await;
    let second = runner.execute(&["once".into()], &[]).await;
    assert_eq!(first.exit_code(), second.exit_code());
    assert_eq!(first.status, RunStatus::Passed);
    assert_eq!(*counter.lock().unwrap(), 2);
}

#[tokio::test]
async fn setup_writes_visible_to_later_modules() {
    let mut registry = ModuleRegistry::new();
    registry.register(FnModule::new("reader", |ctx| {
        Box::pin(async move {
            match ctx.get("ready") {
                Some(value) if value.is_truthy() => Ok(()),
                _ => Err(StepError::rejected("async-setup.pf did not finish first")),
            }
        })
    }));
    let (mut runner, _) = runner_with_log(registry);
    let outcome = runner
        .execute(&["async-setup.pf".into(), "reader".into()], &[])
        .await;
    assert_eq!(outcome.status, RunStatus::Passed);
}

#[tokio::test]
async fn test_failures_are_counted() {
    let (mut runner, log) = runner_with_log(ModuleRegistry::new());
    let outcome = runner
        .execute(&["async-setup.pf".into()], &[fixture("mixed.spec.pf")])
        .await;
    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(outcome.errors.is_empty());
    assert_eq!(
        (outcome.summary.passed, outcome.summary.failed, outcome.summary.skipped),
        (1, 1, 1)
    );
    assert_eq!(events(&log).last().map(String::as_str), Some("done:1/3"));
}
