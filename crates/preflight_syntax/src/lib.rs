//! Syntax frontend for preflight fixture scripts: lexer, parser, AST, diagnostics.
//!
//! Fixture scripts (`.pf`) describe both required setup modules and spec files. This crate only knows the *shape* of
//! a script; deciding which items are legal in a module file versus a spec file happens in the `preflight` crate.
//!
//! ## Examples
//! ```rust
//! use preflight_syntax::{lexer, parser};
//!
//! let tokens = lexer::lex("setup:\n    sleep 10ms\n    set ready = true\n").unwrap();
//! let script = parser::parse(&tokens).unwrap();
//! assert_eq!(script.items.len(), 1);
//! ```

pub mod ast;
pub mod diagnostics;
pub mod lexer;
pub mod parser;

pub use diagnostics::ScriptError;

/// Lex and parse a source string in one go.
///
/// ## Errors
/// Returns every lexer error if tokenization fails, otherwise every parser error.
pub fn parse_source(source: &str) -> Result<ast::Script, Vec<ScriptError>> {
    let tokens = lexer::lex(source)?;
    parser::parse(&tokens)
}
