//! Shared run context
//!
//! The runner creates one [`RunContext`] per run and hands it by `&mut` to each required module in load order and
//! then to every test. Nothing else holds run state, so whatever a test observes was written by an earlier module,
//! hook or test of the same run.

use std::collections::BTreeMap;
use std::fmt;

use preflight_syntax::ast::Literal;

/// A value stored in the context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Value {
    /// `false`, `0` and `""` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Int(n) => *n != 0,
            Value::Bool(b) => *b,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Int(n) => Value::Int(*n),
            Literal::Bool(b) => Value::Bool(*b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    value: Value,
    writer: String,
}

/// Key/value state shared across one run.
#[derive(Debug, Default)]
pub struct RunContext {
    entries: BTreeMap<String, Entry>,
    scope: String,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name recorded as the writer of subsequent `set` calls.
    pub fn enter_scope(&mut self, scope: impl Into<String>) {
        self.scope = scope.into();
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Store a value. The last writer wins; overwriting a key written from another scope is logged.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if let Some(previous) = self.entries.get(&key) {
            if previous.writer != self.scope {
                tracing::warn!(
                    key = %key,
                    previous_writer = %previous.writer,
                    writer = %self.scope,
                    "context key overwritten by a different module"
                );
            }
        }
        self.entries.insert(
            key,
            Entry {
                value,
                writer: self.scope.clone(),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Scope that last wrote `key`.
    pub fn writer_of(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.writer.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|e| e.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Str("x".into()).is_truthy());
    }

    #[test]
    fn test_equality_is_typed() {
        assert_ne!(Value::Int(1), Value::Str("1".into()));
        assert_ne!(Value::Bool(true), Value::Int(1));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Str("db".into()).to_string(), "\"db\"");
        assert_eq!(Value::Int(3).to_string(), "3");
        assert_eq!(Value::Bool(false).to_string(), "false");
    }

    #[test]
    fn test_set_records_writer() {
        let mut ctx = RunContext::new();
        ctx.enter_scope("a.pf");
        ctx.set("ready", true);
        ctx.enter_scope("b.pf");
        ctx.set("port", 8080i64);
        assert_eq!(ctx.get("ready"), Some(&Value::Bool(true)));
        assert_eq!(ctx.writer_of("ready"), Some("a.pf"));
        assert_eq!(ctx.writer_of("port"), Some("b.pf"));
    }

    #[test]
    fn test_last_writer_wins() {
        let mut ctx = RunContext::new();
        ctx.enter_scope("a.pf");
        ctx.set("port", 1i64);
        ctx.enter_scope("b.pf");
        ctx.set("port", 2i64);
        assert_eq!(ctx.get("port"), Some(&Value::Int(2)));
        assert_eq!(ctx.writer_of("port"), Some("b.pf"));
    }

    #[test]
    fn test_remove_and_keys() {
        let mut ctx = RunContext::new();
        ctx.set("b", 1i64);
        ctx.set("a", 2i64);
        assert_eq!(ctx.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(ctx.remove("a"), Some(Value::Int(2)));
        assert!(!ctx.contains("a"));
        assert_eq!(ctx.len(), 1);
    }
}
