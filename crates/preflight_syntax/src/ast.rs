//! Abstract syntax tree for fixture scripts

use std::fmt;
use std::time::Duration;

/// Byte range in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A node with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Literal value written in a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "{:?}", s),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Comparison operator used by `expect`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    NotEq,
}

impl Comparison {
    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Eq => "==",
            Comparison::NotEq => "!=",
        }
    }
}

/// A single executable step
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// `set KEY = VALUE`
    Set { key: String, value: Literal },
    /// `unset KEY`
    Unset { key: String },
    /// `sleep 10ms`
    Sleep { duration: Duration },
    /// `expect KEY` or `expect KEY == VALUE`
    Expect {
        key: String,
        check: Option<(Comparison, Literal)>,
    },
    /// `fail "message"`
    Fail { message: String },
    /// `log "message"`
    Log { message: String },
    /// `exec "prog" "arg" -> KEY`
    Exec {
        program: String,
        args: Vec<String>,
        capture: Option<String>,
    },
}

impl Step {
    /// Keyword that introduces this step.
    pub fn keyword(&self) -> &'static str {
        match self {
            Step::Set { .. } => "set",
            Step::Unset { .. } => "unset",
            Step::Sleep { .. } => "sleep",
            Step::Expect { .. } => "expect",
            Step::Fail { .. } => "fail",
            Step::Log { .. } => "log",
            Step::Exec { .. } => "exec",
        }
    }
}

pub type Block = Vec<Spanned<Step>>;

/// Lifecycle hook blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Module file: runs when the module is required
    Setup,
    /// Module file: runs after the whole run
    Teardown,
    /// Spec file: runs once before the suite's tests
    Before,
    /// Spec file: runs once after the suite's tests
    After,
}

impl HookKind {
    pub fn from_keyword(word: &str) -> Option<HookKind> {
        match word {
            "setup" => Some(HookKind::Setup),
            "teardown" => Some(HookKind::Teardown),
            "before" => Some(HookKind::Before),
            "after" => Some(HookKind::After),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HookKind::Setup => "setup",
            HookKind::Teardown => "teardown",
            HookKind::Before => "before",
            HookKind::After => "after",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hook {
    pub kind: HookKind,
    pub body: Block,
}

/// Marker line preceding a test (`@skip`, `@only`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Skip(Option<String>),
    Only,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestDecl {
    pub title: String,
    pub markers: Vec<Spanned<Marker>>,
    pub body: Block,
}

impl TestDecl {
    pub fn is_only(&self) -> bool {
        self.markers.iter().any(|m| m.node == Marker::Only)
    }

    /// Skip reason, if the test carries `@skip`.
    pub fn skip_reason(&self) -> Option<String> {
        self.markers.iter().find_map(|m| match &m.node {
            Marker::Skip(reason) => Some(reason.clone().unwrap_or_default()),
            Marker::Only => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Describe {
    pub title: String,
    pub items: Vec<Spanned<Item>>,
}

/// Top-level (or `describe`-level) item
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Step(Step),
    Hook(Hook),
    Test(TestDecl),
    Describe(Describe),
}

impl Item {
    /// Short description used in diagnostics.
    pub fn describe_kind(&self) -> String {
        match self {
            Item::Step(step) => format!("`{}` step", step.keyword()),
            Item::Hook(hook) => format!("`{}:` block", hook.kind.as_str()),
            Item::Test(_) => "`test` block".to_string(),
            Item::Describe(_) => "`describe` block".to_string(),
        }
    }
}

/// A parsed fixture script
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub items: Vec<Spanned<Item>>,
}
