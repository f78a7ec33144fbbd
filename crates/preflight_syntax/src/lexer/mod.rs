//! Lexer for fixture scripts
//!
//! Scripts are line oriented. Each non-blank line produces its tokens followed by a `Newline`; changes in leading
//! indentation produce `Indent`/`Dedent` tokens the way Python does. Blank lines and `#` comments produce nothing.
//!
//! ## Module Structure
//!
//! - `tokens` - Token types (TokenKind, Token)

pub mod tokens;

use std::iter::Peekable;
use std::str::CharIndices;
use std::time::Duration;

pub use tokens::{Token, TokenKind};

use crate::ast::Span;
use crate::diagnostics::ScriptError;

/// Lexer for fixture script source.
pub struct Lexer<'a> {
    source: &'a str,
    indent_stack: Vec<usize>,
    tokens: Vec<Token>,
    errors: Vec<ScriptError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            indent_stack: vec![0],
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Tokenize the whole source.
    ///
    /// ## Errors
    /// Returns every error found; the lexer keeps going after an error so one pass reports all of them.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Vec<ScriptError>> {
        let mut line_start = 0;
        for line in self.source.split_inclusive('\n') {
            self.lex_line(line_start, line);
            line_start += line.len();
        }

        let end = self.source.len();
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, end, end);
        }
        self.push(TokenKind::Eof, end, end);

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token::new(kind, Span::new(start, end)));
    }

    fn lex_line(&mut self, base: usize, raw: &str) {
        let line = raw.trim_end_matches(['\n', '\r']);
        let content = line.trim_start_matches([' ', '\t']);
        if content.is_empty() || content.starts_with('#') {
            return;
        }

        let leading = &line[..line.len() - content.len()];
        if let Some(tab) = leading.find('\t') {
            self.errors.push(
                ScriptError::lex("tab in indentation", Span::new(base + tab, base + tab + 1))
                    .with_hint("indent with spaces only"),
            );
            return;
        }

        let width = leading.len();
        let content_start = base + width;
        self.handle_indent(width, content_start);
        self.lex_content(content_start, content);
        let end = base + line.len();
        self.push(TokenKind::Newline, end, end);
    }

    fn handle_indent(&mut self, width: usize, at: usize) {
        let current = self.indent_stack.last().copied().unwrap_or(0);
        if width > current {
            self.indent_stack.push(width);
            self.push(TokenKind::Indent, at - (width - current), at);
            return;
        }
        while width < self.indent_stack.last().copied().unwrap_or(0) {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, at, at);
        }
        if width != self.indent_stack.last().copied().unwrap_or(0) {
            self.errors.push(ScriptError::lex(
                "unindent does not match any outer indentation level",
                Span::new(at - width, at),
            ));
        }
    }

    fn lex_content(&mut self, base: usize, content: &str) {
        let mut chars = content.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            let start = base + i;
            match c {
                ' ' | '\t' | '\r' => {}
                '#' => break,
                ':' => self.push(TokenKind::Colon, start, start + 1),
                '@' => self.push(TokenKind::At, start, start + 1),
                '=' => {
                    if matches!(chars.peek(), Some((_, '='))) {
                        chars.next();
                        self.push(TokenKind::EqEq, start, start + 2);
                    } else {
                        self.push(TokenKind::Eq, start, start + 1);
                    }
                }
                '!' => {
                    if matches!(chars.peek(), Some((_, '='))) {
                        chars.next();
                        self.push(TokenKind::NotEq, start, start + 2);
                    } else {
                        self.errors.push(ScriptError::lex("unexpected `!`", Span::new(start, start + 1)));
                    }
                }
                '-' => match chars.peek() {
                    Some((_, '>')) => {
                        chars.next();
                        self.push(TokenKind::Arrow, start, start + 2);
                    }
                    Some((_, d)) if d.is_ascii_digit() => {
                        self.scan_number(base, &mut chars, i, content);
                    }
                    _ => self.errors.push(ScriptError::lex("unexpected `-`", Span::new(start, start + 1))),
                },
                '"' => self.scan_string(base, &mut chars, i),
                c if c.is_ascii_digit() => self.scan_number(base, &mut chars, i, content),
                c if is_ident_start(c) => {
                    let end = scan_ident_end(&mut chars, i + c.len_utf8());
                    self.push(TokenKind::Ident(content[i..end].to_string()), start, base + end);
                }
                other => {
                    self.errors.push(ScriptError::lex(
                        format!("unexpected character `{}`", other),
                        Span::new(start, start + other.len_utf8()),
                    ));
                }
            }
        }
    }

    fn scan_string(&mut self, base: usize, chars: &mut Peekable<CharIndices<'_>>, open: usize) {
        let mut value = String::new();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.push(TokenKind::String(value), base + open, base + i + 1);
                    return;
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, '"')) => value.push('"'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((j, other)) => {
                        self.errors.push(ScriptError::lex(
                            format!("unknown escape `\\{}`", other),
                            Span::new(base + i, base + j + other.len_utf8()),
                        ));
                    }
                    None => break,
                },
                c => value.push(c),
            }
        }
        self.errors.push(ScriptError::lex(
            "unterminated string literal",
            Span::new(base + open, base + open + 1),
        ));
    }

    fn scan_number(&mut self, base: usize, chars: &mut Peekable<CharIndices<'_>>, start: usize, content: &str) {
        let mut end = start + 1;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_ascii_digit() || c == '_' {
                chars.next();
                end = i + 1;
            } else {
                break;
            }
        }
        let digits: String = content[start..end].chars().filter(|c| *c != '_').collect();

        let suffix_end = scan_ident_end(chars, end);
        let suffix = &content[end..suffix_end];
        let span = Span::new(base + start, base + suffix_end);

        let Ok(value) = digits.parse::<i64>() else {
            self.errors.push(ScriptError::lex(format!("integer `{}` out of range", digits), span));
            return;
        };

        match suffix {
            "" => self.push(TokenKind::Int(value), span.start, span.end),
            "ms" | "s" if value >= 0 => {
                let amount = value.unsigned_abs();
                let duration = if suffix == "ms" {
                    Duration::from_millis(amount)
                } else {
                    Duration::from_secs(amount)
                };
                self.push(TokenKind::Duration(duration), span.start, span.end);
            }
            "ms" | "s" => {
                self.errors.push(ScriptError::lex("durations cannot be negative", span));
            }
            other => {
                self.errors.push(
                    ScriptError::lex(format!("invalid number suffix `{}`", other), span)
                        .with_hint("durations are written like `10ms` or `2s`"),
                );
            }
        }
    }
}

/// Advance past identifier characters; returns the end offset (relative to the line content).
fn scan_ident_end(chars: &mut Peekable<CharIndices<'_>>, mut end: usize) -> usize {
    while let Some(&(i, c)) = chars.peek() {
        if is_ident_continue(c) {
            // `key->` must still lex the arrow
            if c == '-' {
                let mut lookahead = chars.clone();
                lookahead.next();
                if matches!(lookahead.peek(), Some((_, '>'))) {
                    break;
                }
            }
            chars.next();
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
}

/// Convenience function to lex a source string.
#[tracing::instrument(skip_all, fields(source_len = source.len()))]
pub fn lex(source: &str) -> Result<Vec<Token>, Vec<ScriptError>> {
    Lexer::new(source).tokenize()
}

// ============================================================================
// TESTS
// ============================================================================
