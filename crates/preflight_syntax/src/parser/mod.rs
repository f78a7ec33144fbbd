//! Parser for fixture scripts
//!
//! Grammar (informal):
//!
//! ```text
//! script   := item*
//! item     := hook | describe | marker* test | step NEWLINE
//! hook     := ("setup" | "teardown" | "before" | "after") ":" NEWLINE block
//! describe := "describe" STRING ":" NEWLINE INDENT item+ DEDENT
//! marker   := "@" IDENT STRING? NEWLINE
//! test     := "test" STRING ":" NEWLINE block
//! block    := INDENT (step NEWLINE)+ DEDENT
//! ```
//!
//! The parser recovers at line boundaries so a single pass reports every malformed line.


use crate::ast::{Comparison, Describe, Hook, HookKind, Item, Literal, Marker, Script, Span, Spanned, Step, TestDecl};
use crate::diagnostics::ScriptError;
use crate::lexer::{Token, TokenKind};

const STEP_KEYWORDS: &[&str] = &["set", "unset", "sleep", "expect", "fail", "log", "exec"];

/// Parser state.
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    eof: Token,
    errors: Vec<ScriptError>,
}

impl<'a> Parser<'a> {
    /// Create a new parser for a token stream produced by [`crate::lexer::lex`].
    pub fn new(tokens: &'a [Token]) -> Self {
        let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
        Self {
            tokens,
            pos: 0,
            eof: Token::new(TokenKind::Eof, Span::new(end, end)),
            errors: Vec::new(),
        }
    }

    /// Parse the entire token stream into a [`Script`].
    ///
    /// ## Errors
    /// Returns every [`ScriptError`] found; parsing continues after an error at the next line boundary.
    pub fn parse(mut self) -> Result<Script, Vec<ScriptError>> {
        let mut items = Vec::new();

        while !self.is_at_end() {
            if self.match_token(&TokenKind::Dedent) {
                continue;
            }
            if self.check(&TokenKind::Indent) {
                let span = self.peek().span;
                self.errors.push(ScriptError::syntax("unexpected indentation", span));
                self.advance();
                self.skip_block_remainder();
                continue;
            }
            match self.item() {
                Ok(item) => items.push(item),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(Script { items })
        } else {
            Err(self.errors)
        }
    }

    // ========================================================================
    // Items
    // ========================================================================

    fn item(&mut self) -> Result<Spanned<Item>, ScriptError> {
        let start = self.peek().span;
        if self.check(&TokenKind::At) {
            let markers = self.markers()?;
            return self.test_decl(start, markers);
        }
        if matches!(&self.peek().kind, TokenKind::Ident(word) if word == "test") {
            return self.test_decl(start, Vec::new());
        }

        let (word, word_span) = self.expect_ident("a step, a block or a test")?;

        if let Some(kind) = HookKind::from_keyword(&word) {
            self.expect(TokenKind::Colon, &format!("after `{}`", word))?;
            self.expect_newline()?;
            let body = self.block(&format!("`{}:`", word), word_span)?;
            let span = start.merge(self.previous_span());
            return Ok(Spanned::new(Item::Hook(Hook { kind, body }), span));
        }

        if word == "describe" {
            return self.describe(start);
        }

        let step = self.step(&word, word_span)?;
        self.expect_newline()?;
        Ok(Spanned::new(Item::Step(step.node), step.span))
    }

    fn markers(&mut self) -> Result<Vec<Spanned<Marker>>, ScriptError> {
        let mut markers = Vec::new();
        while self.check(&TokenKind::At) {
            let at = self.advance().span;
            let (name, name_span) = self.expect_ident("a marker name after `@`")?;
            let marker = match name.as_str() {
                "skip" => {
                    let reason = match &self.peek().kind {
                        TokenKind::String(s) => {
                            let s = s.clone();
                            self.advance();
                            Some(s)
                        }
                        _ => None,
                    };
                    Marker::Skip(reason)
                }
                "only" => Marker::Only,
                other => {
                    return Err(ScriptError::syntax(format!("unknown marker `@{}`", other), name_span)
                        .with_hint("available markers: @skip, @only"));
                }
            };
            let span = at.merge(self.previous_span());
            self.expect_newline()?;
            markers.push(Spanned::new(marker, span));
        }
        Ok(markers)
    }

    fn test_decl(&mut self, start: Span, markers: Vec<Spanned<Marker>>) -> Result<Spanned<Item>, ScriptError> {
        let (word, word_span) = self.expect_ident("`test` after markers")?;
        if word != "test" {
            return Err(ScriptError::syntax(
                format!("markers must be followed by a `test` block, found `{}`", word),
                word_span,
            ));
        }
        let title = self.expect_string("a test title")?;
        self.expect(TokenKind::Colon, "after the test title")?;
        self.expect_newline()?;
        let body = self.block("`test`", word_span)?;
        let span = start.merge(self.previous_span());
        Ok(Spanned::new(Item::Test(TestDecl { title, markers, body }), span))
    }

    fn describe(&mut self, start: Span) -> Result<Spanned<Item>, ScriptError> {
        let title = self.expect_string("a describe title")?;
        self.expect(TokenKind::Colon, "after the describe title")?;
        self.expect_newline()?;
        if !self.match_token(&TokenKind::Indent) {
            return Err(ScriptError::syntax(
                "expected an indented body after `describe`",
                self.peek().span,
            ));
        }

        let mut items = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.is_at_end() {
            if self.check(&TokenKind::Indent) {
                let span = self.peek().span;
                self.errors.push(ScriptError::syntax("unexpected indentation", span));
                self.advance();
                self.skip_block_remainder();
                continue;
            }
            match self.item() {
                Ok(item) => items.push(item),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }
        self.match_token(&TokenKind::Dedent);

        let span = start.merge(self.previous_span());
        Ok(Spanned::new(Item::Describe(Describe { title, items }), span))
    }

    /// Indented list of steps.
    fn block(&mut self, owner: &str, owner_span: Span) -> Result<Vec<Spanned<Step>>, ScriptError> {
        if !self.match_token(&TokenKind::Indent) {
            return Err(ScriptError::syntax(format!("expected an indented block after {}", owner), owner_span)
                .with_hint("indent the steps that belong to the block"));
        }

        let mut body = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.is_at_end() {
            if self.check(&TokenKind::Indent) {
                let span = self.peek().span;
                self.errors.push(ScriptError::syntax("unexpected indentation", span));
                self.advance();
                self.skip_block_remainder();
                continue;
            }
            match self.block_step() {
                Ok(step) => body.push(step),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }
        self.match_token(&TokenKind::Dedent);
        Ok(body)
    }

    fn block_step(&mut self) -> Result<Spanned<Step>, ScriptError> {
        let (word, word_span) = self.expect_ident("a step")?;
        if HookKind::from_keyword(&word).is_some() || word == "test" || word == "describe" {
            return Err(ScriptError::syntax(
                format!("`{}` cannot be nested inside a block", word),
                word_span,
            ));
        }
        let step = self.step(&word, word_span)?;
        self.expect_newline()?;
        Ok(step)
    }

    // ========================================================================
    // Steps
    // ========================================================================

    fn step(&mut self, keyword: &str, keyword_span: Span) -> Result<Spanned<Step>, ScriptError> {
        let step = match keyword {
            "set" => {
                let (key, _) = self.expect_ident("a key after `set`")?;
                self.expect(TokenKind::Eq, "after the key")?;
                let value = self.literal()?;
                Step::Set { key, value }
            }
            "unset" => {
                let (key, _) = self.expect_ident("a key after `unset`")?;
                Step::Unset { key }
            }
            "sleep" => match self.peek().kind {
                TokenKind::Duration(duration) => {
                    self.advance();
                    Step::Sleep { duration }
                }
                _ => {
                    return Err(self.error_here("expected a duration like `10ms` or `2s`"));
                }
            },
            "expect" => {
                let (key, _) = self.expect_ident("a key after `expect`")?;
                let op = match self.peek().kind {
                    TokenKind::EqEq => Some(Comparison::Eq),
                    TokenKind::NotEq => Some(Comparison::NotEq),
                    _ => None,
                };
                let check = match op {
                    Some(op) => {
                        self.advance();
                        Some((op, self.literal()?))
                    }
                    None => None,
                };
                Step::Expect { key, check }
            }
            "fail" => Step::Fail {
                message: self.expect_string("a message after `fail`")?,
            },
            "log" => Step::Log {
                message: self.expect_string("a message after `log`")?,
            },
            "exec" => {
                let program = self.expect_string("a quoted program name after `exec`")?;
                let mut args = Vec::new();
                while let TokenKind::String(arg) = &self.peek().kind {
                    args.push(arg.clone());
                    self.advance();
                }
                let capture = if self.match_token(&TokenKind::Arrow) {
                    Some(self.expect_ident("a key after `->`")?.0)
                } else {
                    None
                };
                Step::Exec { program, args, capture }
            }
            other => {
                return Err(ScriptError::syntax(format!("unknown step `{}`", other), keyword_span)
                    .with_hint(format!("available steps: {}", STEP_KEYWORDS.join(", "))));
            }
        };
        let span = keyword_span.merge(self.previous_span());
        Ok(Spanned::new(step, span))
    }

    fn literal(&mut self) -> Result<Literal, ScriptError> {
        let literal = match &self.peek().kind {
            TokenKind::String(s) => Literal::Str(s.clone()),
            TokenKind::Int(n) => Literal::Int(*n),
            TokenKind::Ident(word) if word == "true" => Literal::Bool(true),
            TokenKind::Ident(word) if word == "false" => Literal::Bool(false),
            TokenKind::Ident(word) => {
                return Err(self
                    .error_here(format!("expected a value, found `{}`", word))
                    .with_hint("quote strings: \"like this\""));
            }
            other => return Err(self.error_here(format!("expected a value, found {}", other))),
        };
        self.advance();
        Ok(literal)
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        token
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::syntax(message, self.peek().span)
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<Token, ScriptError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("expected {} {}, found {}", kind, context, self.peek().kind)))
        }
    }

    fn expect_newline(&mut self) -> Result<(), ScriptError> {
        if self.match_token(&TokenKind::Newline) || self.is_at_end() {
            Ok(())
        } else {
            Err(self.error_here(format!("expected end of line, found {}", self.peek().kind)))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span), ScriptError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                let span = self.advance().span;
                Ok((name, span))
            }
            other => Err(self.error_here(format!("expected {}, found {}", what, other))),
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<String, ScriptError> {
        match &self.peek().kind {
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            other => Err(self.error_here(format!("expected {}, found {}", what, other))),
        }
    }

    /// Skip to the start of the next line, and over any block nested under the bad line.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            if self.check(&TokenKind::Dedent) {
                return;
            }
            if self.match_token(&TokenKind::Newline) {
                break;
            }
            self.advance();
        }
        if self.match_token(&TokenKind::Indent) {
            self.skip_block_remainder();
        }
    }

    /// Skip tokens until the `Dedent` closing the block we are inside of.
    fn skip_block_remainder(&mut self) {
        let mut depth = 1usize;
        while !self.is_at_end() {
            match self.advance().kind {
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }
}

/// Parse a token stream into a [`Script`].
///
/// ## Errors
/// Returns `Err(Vec<ScriptError>)` if parsing fails.
#[tracing::instrument(skip_all, fields(token_count = tokens.len()))]
pub fn parse(tokens: &[Token]) -> Result<Script, Vec<ScriptError>> {
    Parser::new(tokens).parse()
}
