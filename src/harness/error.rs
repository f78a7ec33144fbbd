//! Error types for the harness
//!
//! - [`StepError`]: a step, module setup/teardown or test body failed
//! - [`LoadError`]: a required module or spec file could not be resolved or read
//! - [`HarnessError`]: a fatal condition of the run as a whole

use std::path::{Path, PathBuf};

use preflight_syntax::diagnostics::ScriptError;
use thiserror::Error;

use super::context::Value;
use crate::frontend::{ScriptDiagnostic, summarize_errors};

/// Failure of a single step (and therefore of the block running it)
#[derive(Debug, Error)]
pub enum StepError {
    /// `fail "message"` or an explicit rejection from an in-process module
    #[error("{0}")]
    Rejected(String),

    #[error("expected `{key}` to be set")]
    Missing { key: String },

    #[error("expected `{key}` to be truthy, got {actual}")]
    Falsy { key: String, actual: Value },

    #[error("expected `{key}` {op} {expected}, got {actual}")]
    Mismatch {
        key: String,
        op: &'static str,
        expected: Value,
        actual: Value,
    },

    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}{}", stderr_suffix(.stderr))]
    ExitStatus {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Timeout of {0}ms exceeded")]
    Timeout(u128),

    #[error("panicked: {0}")]
    Panicked(String),
}

impl StepError {
    pub fn rejected(message: impl Into<String>) -> Self {
        StepError::Rejected(message.into())
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

fn script_summary(path: &Path, source_text: &str, errors: &[ScriptError]) -> String {
    summarize_errors(&path.display().to_string(), source_text, errors)
}

/// A required module or spec file could not be turned into something runnable
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot find module '{0}'")]
    ModuleNotFound(String),

    #[error("cannot find spec file '{}'", .0.display())]
    SpecNotFound(PathBuf),

    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", script_summary(.path, .source_text, .errors))]
    Script {
        path: PathBuf,
        source_text: String,
        errors: Vec<ScriptError>,
    },
}

impl LoadError {
    /// Rich diagnostics for script errors; empty for other variants.
    pub fn diagnostics(&self) -> Vec<ScriptDiagnostic> {
        match self {
            LoadError::Script {
                path,
                source_text,
                errors,
            } => ScriptDiagnostic::from_errors(&path.display().to_string(), source_text, errors),
            _ => Vec::new(),
        }
    }
}

/// A fatal condition of the run
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("required module '{module}' failed during setup: {source}")]
    Setup {
        module: String,
        #[source]
        source: StepError,
    },

    #[error("required module '{module}' failed during teardown: {source}")]
    Teardown {
        module: String,
        #[source]
        source: StepError,
    },
}

impl HarnessError {
    /// Title used when a reporter lists this error next to failed tests.
    pub fn title(&self) -> String {
        match self {
            HarnessError::Load(_) => "load".to_string(),
            HarnessError::Setup { module, .. } => format!("\"setup\" hook: {}", module),
            HarnessError::Teardown { module, .. } => format!("\"teardown\" hook: {}", module),
        }
    }

    /// The file or module the error is about, if any.
    pub fn origin(&self) -> String {
        match self {
            HarnessError::Load(LoadError::ModuleNotFound(id)) => id.clone(),
            HarnessError::Load(LoadError::SpecNotFound(path))
            | HarnessError::Load(LoadError::Io { path, .. })
            | HarnessError::Load(LoadError::Script { path, .. }) => path.display().to_string(),
            HarnessError::Setup { module, .. } | HarnessError::Teardown { module, .. } => module.clone(),
        }
    }
}
