//! Module files versus spec files
//!
//! Both kinds share one syntax. A *module file* (loaded with `--require`) may contain bare steps, `setup:` and
//! `teardown:` blocks. A *spec file* holds `test` blocks, optionally grouped by `describe`, with `before:`/`after:`
//! hooks. Anything else is reported as a structural error pointing at the offending item.

use preflight_syntax::ast::{Block, HookKind, Item, Script, Spanned, TestDecl};
use preflight_syntax::diagnostics::ScriptError;

/// A required module's script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleScript {
    pub setup: Block,
    pub teardown: Block,
}

impl ModuleScript {
    /// Shape a parsed script as a module file.
    ///
    /// Bare top-level steps and `setup:` blocks are concatenated in file order.
    pub fn from_script(script: Script) -> Result<Self, Vec<ScriptError>> {
        let mut module = ModuleScript::default();
        let mut errors = Vec::new();

        for item in script.items {
            let span = item.span;
            match item.node {
                Item::Step(step) => module.setup.push(Spanned::new(step, span)),
                Item::Hook(hook) if hook.kind == HookKind::Setup => module.setup.extend(hook.body),
                Item::Hook(hook) if hook.kind == HookKind::Teardown => module.teardown.extend(hook.body),
                other => errors.push(
                    ScriptError::structure(format!("{} is not allowed in a module file", other.describe_kind()), span)
                        .with_hint("tests and their hooks belong in spec files passed as positional arguments"),
                ),
            }
        }

        if errors.is_empty() { Ok(module) } else { Err(errors) }
    }
}

/// One `describe` level of a spec file; the file itself is the untitled root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuiteNode {
    pub title: Option<String>,
    pub before: Vec<Block>,
    pub after: Vec<Block>,
    pub tests: Vec<TestDecl>,
    pub children: Vec<SuiteNode>,
}

impl SuiteNode {
    /// Number of tests in this suite and every nested suite.
    pub fn test_count(&self) -> usize {
        self.tests.len() + self.children.iter().map(SuiteNode::test_count).sum::<usize>()
    }

    fn build(title: Option<String>, items: Vec<Spanned<Item>>, errors: &mut Vec<ScriptError>) -> SuiteNode {
        let mut suite = SuiteNode {
            title,
            ..SuiteNode::default()
        };

        for item in items {
            let span = item.span;
            match item.node {
                Item::Test(test) => suite.tests.push(test),
                Item::Describe(describe) => {
                    suite
                        .children
                        .push(SuiteNode::build(Some(describe.title), describe.items, errors));
                }
                Item::Hook(hook) => match hook.kind {
                    HookKind::Before => suite.before.push(hook.body),
                    HookKind::After => suite.after.push(hook.body),
                    HookKind::Setup | HookKind::Teardown => errors.push(
                        ScriptError::structure(
                            format!("`{}:` is not allowed in a spec file", hook.kind.as_str()),
                            span,
                        )
                        .with_hint("move it to a module file and load it with --require"),
                    ),
                },
                Item::Step(step) => errors.push(
                    ScriptError::structure(
                        format!("`{}` step must be inside a `test` or hook block", step.keyword()),
                        span,
                    )
                    .with_hint("wrap it in `before:` to run it once before the tests"),
                ),
            }
        }

        suite
    }
}

/// A spec file's script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecScript {
    pub root: SuiteNode,
}

impl SpecScript {
    /// Shape a parsed script as a spec file.
    pub fn from_script(script: Script) -> Result<Self, Vec<ScriptError>> {
        let mut errors = Vec::new();
        let root = SuiteNode::build(None, script.items, &mut errors);
        if errors.is_empty() { Ok(SpecScript { root }) } else { Err(errors) }
    }

    pub fn test_count(&self) -> usize {
        self.root.test_count()
    }
}

/// Lex, parse and shape a module file.
pub fn parse_module(source: &str) -> Result<ModuleScript, Vec<ScriptError>> {
    ModuleScript::from_script(preflight_syntax::parse_source(source)?)
}

/// Lex, parse and shape a spec file.
pub fn parse_spec(source: &str) -> Result<SpecScript, Vec<ScriptError>> {
    SpecScript::from_script(preflight_syntax::parse_source(source)?)
}
