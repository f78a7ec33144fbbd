//! Step interpreter
//!
//! Setup blocks, teardown blocks, hooks and test bodies are all lists of steps run strictly in order against the
//! shared [`RunContext`]. The first failing step ends its block.

use preflight_syntax::ast::{Comparison, Literal, Spanned, Step};

use super::context::{RunContext, Value};
use super::error::StepError;

/// Run every step of a block in order.
pub async fn run_block(block: &[Spanned<Step>], ctx: &mut RunContext) -> Result<(), StepError> {
    for step in block {
        run_step(&step.node, ctx).await?;
    }
    Ok(())
}

/// Run a single step.
pub async fn run_step(step: &Step, ctx: &mut RunContext) -> Result<(), StepError> {
    tracing::trace!(step = step.keyword(), scope = %ctx.scope(), "running step");
    match step {
        Step::Set { key, value } => {
            ctx.set(key.clone(), Value::from(value));
            Ok(())
        }
        Step::Unset { key } => {
            ctx.remove(key);
            Ok(())
        }
        Step::Sleep { duration } => {
            tokio::time::sleep(*duration).await;
            Ok(())
        }
        Step::Expect { key, check } => check_expectation(ctx, key, check.as_ref()),
        Step::Fail { message } => Err(StepError::rejected(message.clone())),
        Step::Log { message } => {
            tracing::info!(scope = %ctx.scope(), "{}", message);
            Ok(())
        }
        Step::Exec {
            program,
            args,
            capture,
        } => exec(program, args, capture.as_deref(), ctx).await,
    }
}

fn check_expectation(ctx: &RunContext, key: &str, check: Option<&(Comparison, Literal)>) -> Result<(), StepError> {
    let actual = ctx.get(key).ok_or_else(|| StepError::Missing { key: key.to_string() })?;

    let Some((op, expected)) = check else {
        return if actual.is_truthy() {
            Ok(())
        } else {
            Err(StepError::Falsy {
                key: key.to_string(),
                actual: actual.clone(),
            })
        };
    };

    let expected = Value::from(expected);
    let holds = match op {
        Comparison::Eq => *actual == expected,
        Comparison::NotEq => *actual != expected,
    };
    if holds {
        Ok(())
    } else {
        Err(StepError::Mismatch {
            key: key.to_string(),
            op: op.as_str(),
            expected,
            actual: actual.clone(),
        })
    }
}

async fn exec(program: &str, args: &[String], capture: Option<&str>, ctx: &mut RunContext) -> Result<(), StepError> {
    tracing::debug!(program, ?args, "spawning subprocess");
    let output = tokio::process::Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| StepError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(StepError::ExitStatus {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    if let Some(key) = capture {
        let stdout = String::from_utf8_lossy(&output.stdout);
        ctx.set(key, stdout.trim().to_string());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::frontend::parse_module;

    async fn run_source(source: &str, ctx: &mut RunContext) -> Result<(), StepError> {
        let module = parse_module(source).unwrap();
        run_block(&module.setup, ctx).await
    }

    #[tokio::test]
    async fn test_set_then_expect() {
        let mut ctx = RunContext::new();
        run_source("set ready = true\nexpect ready\nexpect ready == true\n", &mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.get("ready"), Some(&Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_expect_missing_key() {
        let mut ctx = RunContext::new();
        let err = run_source("expect ready\n", &mut ctx).await.unwrap_err();
        assert!(matches!(err, StepError::Missing { ref key } if key == "ready"));
    }

    #[tokio::test]
    async fn test_expect_falsy() {
        let mut ctx = RunContext::new();
        let err = run_source("set count = 0\nexpect count\n", &mut ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "expected `count` to be truthy, got 0");
    }

    #[tokio::test]
    async fn test_expect_mismatch_message() {
        let mut ctx = RunContext::new();
        let err = run_source("set name = \"a\"\nexpect name == \"b\"\n", &mut ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "expected `name` == \"b\", got \"a\"");
    }

    #[tokio::test]
    async fn test_expect_not_equal() {
        let mut ctx = RunContext::new();
        run_source("set port = 1\nexpect port != 2\n", &mut ctx).await.unwrap();
        let err = run_source("expect port != 1\n", &mut ctx).await.unwrap_err();
        assert!(matches!(err, StepError::Mismatch { op: "!=", .. }));
    }

    #[tokio::test]
    async fn test_fail_stops_block() {
        let mut ctx = RunContext::new();
        let err = run_source("fail \"db unreachable\"\nset after = true\n", &mut ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "db unreachable");
        assert!(!ctx.contains("after"));
    }

    #[tokio::test]
    async fn test_unset() {
        let mut ctx = RunContext::new();
        run_source("set a = 1\nunset a\n", &mut ctx).await.unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_suspends() {
        let mut ctx = RunContext::new();
        let start = tokio::time::Instant::now();
        run_source("sleep 2s\nset woke = true\n", &mut ctx).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(ctx.contains("woke"));
    }

    #[tokio::test]
    async fn test_log_is_not_a_failure() {
        let mut ctx = RunContext::new();
        run_source("log \"hello\"\n", &mut ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_exec_missing_program() {
        let mut ctx = RunContext::new();
        let err = run_source("exec \"preflight-no-such-program-xyz\"\n", &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_captures_stdout() {
        let mut ctx = RunContext::new();
        run_source("exec \"echo\" \"  seeded  \" -> status\n", &mut ctx).await.unwrap();
        assert_eq!(ctx.get("status"), Some(&Value::Str("seeded".into())));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_nonzero_exit() {
        let mut ctx = RunContext::new();
        let err = run_source("exec \"false\"\n", &mut ctx).await.unwrap_err();
        assert!(matches!(err, StepError::ExitStatus { ref program, .. } if program == "false"));
    }
}
