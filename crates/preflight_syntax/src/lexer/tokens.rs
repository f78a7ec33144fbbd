//! Token types for the fixture script lexer

use std::fmt;
use std::time::Duration;

use crate::ast::Span;

/// Token types
///
/// Words are never reserved at the lexer level: `set`, `test`, `setup` and friends are plain identifiers and the
/// parser decides from position whether a word is a keyword or a key.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ========== Identifiers and Literals ==========
    Ident(String),
    Int(i64),
    String(String),
    Duration(Duration),

    // ========== Operators ==========
    Eq,    // =
    EqEq,  // ==
    NotEq, // !=
    Arrow, // ->

    // ========== Punctuation ==========
    Colon, // :
    At,    // @

    // ========== Layout ==========
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "identifier `{}`", name),
            TokenKind::Int(n) => write!(f, "integer `{}`", n),
            TokenKind::String(s) => write!(f, "string {:?}", s),
            TokenKind::Duration(d) => write!(f, "duration `{}ms`", d.as_millis()),
            TokenKind::Eq => write!(f, "`=`"),
            TokenKind::EqEq => write!(f, "`==`"),
            TokenKind::NotEq => write!(f, "`!=`"),
            TokenKind::Arrow => write!(f, "`->`"),
            TokenKind::Colon => write!(f, "`:`"),
            TokenKind::At => write!(f, "`@`"),
            TokenKind::Newline => write!(f, "end of line"),
            TokenKind::Indent => write!(f, "indent"),
            TokenKind::Dedent => write!(f, "dedent"),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}
