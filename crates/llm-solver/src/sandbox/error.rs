use std::time::Duration;
use thiserror::Error;

/// Failure of a single snippet execution.
///
/// These never propagate out of [`CodeSandbox::execute`](super::CodeSandbox::execute);
/// they are rendered into the `error` field of the returned
/// [`Execution`](super::Execution).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// The snippet could not be tokenized or parsed.
    #[error("{0}")]
    Syntax(String),

    /// The snippet threw (explicitly, or through a runtime type/reference error).
    #[error("{0}")]
    Thrown(String),

    /// The step budget ran out.
    #[error("Execution step budget exceeded ({0} steps)")]
    BudgetExceeded(u64),

    /// The wall-clock limit ran out.
    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),

    /// Function calls nested deeper than the configured limit.
    #[error("Maximum call stack size exceeded")]
    StackOverflow,

    /// The returned value could not be captured within the string length limit.
    #[error("Execution result is too large (over {0} bytes)")]
    ResultTooLarge(usize),

    /// The sandbox itself failed (worker thread could not run or panicked).
    #[error("Sandbox failure: {0}")]
    Internal(String),
}

impl ExecutionError {
    /// Returns true for errors raised by the sandbox's resource limits.
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            ExecutionError::BudgetExceeded(_)
                | ExecutionError::Timeout(_)
                | ExecutionError::StackOverflow
                | ExecutionError::ResultTooLarge(_)
        )
    }
}
