//! Script errors as miette diagnostics
//!
//! The CLI renders these with miette's graphical handler (source snippet + label). Reporters that need a single
//! line per problem use [`summarize_errors`] instead.

use miette::{Diagnostic, NamedSource, SourceSpan};
use preflight_syntax::diagnostics::{ScriptError, line_col};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(preflight::script))]
pub struct ScriptDiagnostic {
    message: String,
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
}

impl ScriptDiagnostic {
    pub fn new(name: &str, source: &str, error: &ScriptError) -> Self {
        let start = error.span.start.min(source.len());
        let len = error.span.len().min(source.len() - start);
        Self {
            message: error.to_string(),
            src: NamedSource::new(name, source.to_string()),
            span: (start, len).into(),
            help: (!error.hints.is_empty()).then(|| error.hints.join("\n")),
        }
    }

    /// Build one diagnostic per error.
    pub fn from_errors(name: &str, source: &str, errors: &[ScriptError]) -> Vec<Self> {
        errors.iter().map(|e| Self::new(name, source, e)).collect()
    }
}

/// One `file:line:col: kind: message` line per error.
pub fn summarize_errors(name: &str, source: &str, errors: &[ScriptError]) -> String {
    errors
        .iter()
        .map(|e| {
            let (line, col) = line_col(source, e.span.start);
            format!("{}:{}:{}: {}", name, line, col, e)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
