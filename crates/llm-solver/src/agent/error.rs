//! Error types for the agent module.

use thiserror::Error;

/// Errors raised by an LLM-call or document collaborator.
///
/// The solver treats every variant as an upstream (API) failure: it is
/// surfaced to the caller and never retried by the solver itself.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent execution failed with a specific error message.
    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),

    /// Transport-level failure talking to the backend.
    #[error("Process error: {0}")]
    ProcessError(String),

    /// The backend did not answer in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// I/O error occurred during agent execution.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A generic error for other cases.
    #[error("Agent error: {0}")]
    Other(String),
}

impl AgentError {
    /// Returns true if the failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            AgentError::Timeout(_) => true,
            AgentError::IoError(err) => err.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}
