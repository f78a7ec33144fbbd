//! Fixture script frontend
//!
//! This module contains:
//! - `lexer`, `parser`, `ast`, `diagnostics`: re-exported from the `preflight_syntax` crate
//! - `script`: shapes a parsed script into a module file or a spec file
//! - `report`: miette diagnostics for script errors

// Syntax components are provided by the shared preflight_syntax crate.
pub use preflight_syntax::{ast, diagnostics, lexer, parser};

pub mod report;
pub mod script;

pub use report::{ScriptDiagnostic, summarize_errors};
pub use script::{ModuleScript, SpecScript, SuiteNode, parse_module, parse_spec};
