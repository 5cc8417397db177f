//! Isolated execution of model-supplied code snippets.
//!
//! Snippets are written in a small JavaScript subset and run by an explicit
//! interpreter, never by a host engine. Each execution:
//!
//! 1. strips math-delimiter spans and comments ([`clean_snippet`]),
//! 2. parses the rest as the body of an argument-less function,
//! 3. evaluates it in a fresh scope that sees only the builtin globals,
//! 4. returns the snippet's return value or the message of what it threw.
//!
//! Evaluation is bounded by a step budget, a call-depth limit, array and
//! string length limits and a wall-clock timeout. It runs on its own thread with a
//! dedicated stack so a hostile snippet cannot take the host down.
//! [`CodeSandbox::execute`] never fails: every problem ends up in
//! [`Execution::error`].
//!
//! # Examples
//!
//! ```rust
//! use llm_solver::sandbox::{CodeSandbox, ExecValue};
//!
//! let sandbox = CodeSandbox::new();
//!
//! let ok = sandbox.execute("return 2+2;");
//! assert_eq!(ok.result, Some(ExecValue::Number(4.0)));
//! assert_eq!(ok.error, None);
//!
//! let thrown = sandbox.execute("throw new Error('x');");
//! assert_eq!(thrown.result, None);
//! assert_eq!(thrown.error.as_deref(), Some("x"));
//! ```

mod ast;
mod builtins;
pub mod clean;
pub mod error;
pub mod format;
mod interpreter;
mod lexer;
mod parser;
pub mod value;

pub use self::clean::clean_snippet;
pub use self::error::ExecutionError;
pub use self::format::{ExecutionContext, display_execution, display_value, format_number};
pub use self::value::ExecValue;

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::time::Duration;

/// Result reported when cleaning leaves nothing to run.
pub const NO_EXECUTABLE_CODE: &str = "No executable code found after cleaning.";

/// Resource limits for one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Maximum number of evaluated statements and expressions.
    pub step_budget: u64,
    /// Maximum nesting of snippet function calls.
    pub max_call_depth: usize,
    /// Wall-clock limit.
    pub timeout: Duration,
    /// Largest array a snippet may build.
    pub max_array_length: usize,
    /// Longest string a snippet may build, in bytes. Also caps the size of
    /// the returned value.
    pub max_string_length: usize,
    /// Stack size of the worker thread, in bytes.
    pub stack_size: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            step_budget: 100_000_000,
            max_call_depth: 128,
            timeout: Duration::from_secs(2),
            max_array_length: 1_000_000,
            max_string_length: 1 << 24,
            stack_size: 16 * 1024 * 1024,
        }
    }
}

impl SandboxConfig {
    pub fn with_step_budget(mut self, step_budget: u64) -> Self {
        self.step_budget = step_budget;
        self
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_string_length(mut self, max_string_length: usize) -> Self {
        self.max_string_length = max_string_length;
        self
    }
}

/// Outcome of one snippet execution.
///
/// `result == None` with `error == None` means the snippet returned
/// `undefined`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Execution {
    pub fn success(result: Option<ExecValue>) -> Self {
        Self {
            result,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Executes snippets under a fixed [`SandboxConfig`].
#[derive(Debug, Clone, Default)]
pub struct CodeSandbox {
    config: SandboxConfig,
}

impl CodeSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Runs `code` and captures its return value or error. Never panics and
    /// never returns an error.
    pub fn execute(&self, code: &str) -> Execution {
        let cleaned = clean_snippet(code);
        if cleaned.is_empty() {
            return Execution::success(Some(ExecValue::String(NO_EXECUTABLE_CODE.to_string())));
        }

        let outcome = std::thread::scope(|scope| {
            let worker = std::thread::Builder::new()
                .name("llm-solver-sandbox".to_string())
                .stack_size(self.config.stack_size)
                .spawn_scoped(scope, || run_snippet(&cleaned, &self.config));

            match worker {
                Ok(handle) => handle
                    .join()
                    .unwrap_or_else(|panic| Err(ExecutionError::Internal(panic_message(&*panic)))),
                Err(e) => {
                    log::warn!("Could not spawn sandbox thread, running inline: {e}");
                    run_snippet(&cleaned, &self.config)
                }
            }
        });

        match outcome {
            Ok(result) => Execution::success(result),
            Err(error) => {
                log::debug!("Snippet execution failed: {error}");
                Execution::failure(error.to_string())
            }
        }
    }
}

fn run_snippet(code: &str, config: &SandboxConfig) -> Result<Option<ExecValue>, ExecutionError> {
    let program = parser::parse_program(code)?;
    let mut interpreter = interpreter::Interpreter::new(config);
    let value = interpreter.run(&program);
    log::debug!("Snippet evaluated in {} steps", interpreter.steps());
    value?
        .to_exec_value(config.max_string_length)
        .map_err(|_| ExecutionError::ResultTooLarge(config.max_string_length))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker thread panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_value() {
        let execution = CodeSandbox::new().execute("return 2+2;");
        assert_eq!(execution, Execution::success(Some(ExecValue::Number(4.0))));
    }

    #[test]
    fn test_thrown_error_is_captured() {
        let execution = CodeSandbox::new().execute("throw new Error('x');");
        assert_eq!(execution, Execution::failure("x"));
    }

    #[test]
    fn test_math_markup_and_comments_are_removed() {
        let code = "// compute $P(X \\ge 7)$\n/* binomial */\nreturn Math.pow(0.5, 10) * 176;";
        let execution = CodeSandbox::new().execute(code);
        assert_eq!(execution.result, Some(ExecValue::Number(176.0 / 1024.0)));
    }

    #[test]
    fn test_only_comments() {
        let execution = CodeSandbox::new().execute("// nothing here");
        assert_eq!(
            execution.result,
            Some(ExecValue::String(NO_EXECUTABLE_CODE.to_string()))
        );
        assert!(!execution.is_error());
    }

    #[test]
    fn test_no_return_is_undefined() {
        let execution = CodeSandbox::new().execute("let x = 1;");
        assert_eq!(execution, Execution::default());
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let execution = CodeSandbox::new().execute("return (1 + ;");
        assert!(execution.error.unwrap().starts_with("Unexpected token"));
    }

    #[test]
    fn test_infinite_loop_is_bounded() {
        let sandbox = CodeSandbox::with_config(SandboxConfig::default().with_step_budget(50_000));
        let execution = sandbox.execute("let i = 0; while (true) { i++; }");
        assert_eq!(
            execution.error.as_deref(),
            Some("Execution step budget exceeded (50000 steps)")
        );
    }

    #[test]
    fn test_timeout() {
        let sandbox = CodeSandbox::with_config(
            SandboxConfig::default()
                .with_step_budget(u64::MAX)
                .with_timeout(Duration::from_millis(20)),
        );
        let execution = sandbox.execute("for (;;) {}");
        assert!(execution.error.unwrap().starts_with("Execution timed out"));
    }

    #[test]
    fn test_unbounded_recursion() {
        let execution = CodeSandbox::new().execute("const f = n => f(n + 1); return f(0);");
        assert_eq!(
            execution.error.as_deref(),
            Some("Maximum call stack size exceeded")
        );
    }

    #[test]
    fn test_string_doubling_is_bounded() {
        let execution = CodeSandbox::new().execute("let s = 'x'; for (;;) s += s;");
        assert_eq!(execution.error.as_deref(), Some("Invalid string length"));
    }

    #[test]
    fn test_oversized_result_is_rejected() {
        let sandbox = CodeSandbox::with_config(SandboxConfig::default().with_max_string_length(1000));
        let execution = sandbox.execute("const s = 'abcdefghij'; return new Array(200).fill(s);");
        assert_eq!(
            execution.error.as_deref(),
            Some("Execution result is too large (over 1000 bytes)")
        );
    }

    #[test]
    fn test_no_access_to_outer_state() {
        let sandbox = CodeSandbox::new();
        sandbox.execute("var leaked = 1;");
        let execution = sandbox.execute("return typeof leaked;");
        assert_eq!(execution.result, Some(ExecValue::String("undefined".to_string())));
    }

    #[test]
    fn test_execution_serializes_without_undefined_fields() {
        let json = serde_json::to_string(&Execution::success(Some(ExecValue::Number(0.5)))).unwrap();
        assert_eq!(json, r#"{"result":0.5}"#);
    }
}
