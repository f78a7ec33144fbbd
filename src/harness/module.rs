//! Required (setup) modules
//!
//! A required module's entry point returns a future. The runner awaits each one to completion before it starts the
//! next, so later modules (and all tests) observe everything earlier modules wrote into the [`RunContext`].

use std::fmt;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::context::RunContext;
use super::error::StepError;
use super::step::run_block;
use crate::frontend::ModuleScript;

/// Lifecycle of a required module within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Registered,
    Loading,
    Ready,
    Failed,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleState::Registered => write!(f, "registered"),
            ModuleState::Loading => write!(f, "loading"),
            ModuleState::Ready => write!(f, "ready"),
            ModuleState::Failed => write!(f, "failed"),
        }
    }
}

/// A unit of setup loaded before any test runs.
#[async_trait]
pub trait SetupModule: Send + Sync {
    /// Name used in reports and as the writer of context keys.
    fn name(&self) -> &str;

    /// Asynchronous initialization. An `Err` aborts the run before any test executes.
    async fn setup(&self, ctx: &mut RunContext) -> Result<(), StepError>;

    /// Runs after the tests (or after a setup abort), in reverse load order.
    async fn teardown(&self, _ctx: &mut RunContext) -> Result<(), StepError> {
        Ok(())
    }
}

/// Module backed by a `.pf` module file.
#[derive(Debug)]
pub struct ScriptModule {
    name: String,
    script: ModuleScript,
}

impl ScriptModule {
    pub fn new(name: impl Into<String>, script: ModuleScript) -> Self {
        Self {
            name: name.into(),
            script,
        }
    }
}

#[async_trait]
impl SetupModule for ScriptModule {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&self, ctx: &mut RunContext) -> Result<(), StepError> {
        run_block(&self.script.setup, ctx).await
    }

    async fn teardown(&self, ctx: &mut RunContext) -> Result<(), StepError> {
        run_block(&self.script.teardown, ctx).await
    }
}

/// Async hook signature for [`FnModule`].
pub type HookFn = Box<dyn for<'a> Fn(&'a mut RunContext) -> BoxFuture<'a, Result<(), StepError>> + Send + Sync>;

/// In-process module built from async closures, for embedding the harness in Rust code.
///
/// ```rust
/// use preflight::harness::FnModule;
///
/// let module = FnModule::new("db", |ctx| {
///     Box::pin(async move {
///         ctx.set("db.url", "sqlite::memory:");
///         Ok(())
///     })
/// });
/// # let _ = module;
/// ```
pub struct FnModule {
    name: String,
    setup: HookFn,
    teardown: Option<HookFn>,
}

impl FnModule {
    pub fn new<F>(name: impl Into<String>, setup: F) -> Self
    where
        F: for<'a> Fn(&'a mut RunContext) -> BoxFuture<'a, Result<(), StepError>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            setup: Box::new(setup),
            teardown: None,
        }
    }

    pub fn with_teardown<F>(mut self, teardown: F) -> Self
    where
        F: for<'a> Fn(&'a mut RunContext) -> BoxFuture<'a, Result<(), StepError>> + Send + Sync + 'static,
    {
        self.teardown = Some(Box::new(teardown));
        self
    }
}

impl fmt::Debug for FnModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModule")
            .field("name", &self.name)
            .field("has_teardown", &self.teardown.is_some())
            .finish()
    }
}

#[async_trait]
impl SetupModule for FnModule {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&self, ctx: &mut RunContext) -> Result<(), StepError> {
        (self.setup)(ctx).await
    }

    async fn teardown(&self, ctx: &mut RunContext) -> Result<(), StepError> {
        match &self.teardown {
            Some(teardown) => teardown(ctx).await,
            None => Ok(()),
        }
    }
}
