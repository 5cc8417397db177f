//! Error types returned by [`Solver::solve`](crate::Solver::solve).

use crate::agent::AgentError;
use crate::config::ConfigError;
use crate::extract::ParseError;
use thiserror::Error;

/// Failure of one essential model call.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// The reply could not be turned into the expected structure.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The LLM collaborator failed.
    #[error(transparent)]
    Api(#[from] AgentError),

    /// A prompt template failed to render.
    #[error("Prompt rendering failed: {0}")]
    Prompt(#[from] minijinja::Error),
}

impl PhaseError {
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, PhaseError::Parse(_))
    }
}

/// Coarse error classification for callers that present errors to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Parse,
    Api,
    Timeout,
    Validation,
    Internal,
}

/// Errors that abort a solve call.
///
/// Non-essential failures (verification-code generation, snippet errors) never
/// show up here; they are recorded on the result instead.
#[derive(Debug, Error)]
pub enum SolveError {
    /// Missing credential or unusable settings. Raised before any model call.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The understanding phase failed.
    #[error("Error understanding problem: {0}")]
    Understanding(PhaseError),

    /// The understanding phase of an advanced-mode solve failed.
    #[error("Error understanding problem (Advanced): {0}")]
    AdvancedUnderstanding(PhaseError),

    /// The textual-solution phase failed.
    #[error("Error generating textual solution: {0}")]
    Solution(PhaseError),

    /// Uploading the supporting document failed.
    #[error("Error uploading document: {0}")]
    Document(AgentError),

    /// The result was structurally present but empty.
    #[error("{0}")]
    Validation(String),
}

impl SolveError {
    /// Returns true when the failure came from unparseable model output, the
    /// only condition the retry wrapper retries on.
    pub fn is_parse_failure(&self) -> bool {
        match self {
            SolveError::Understanding(e)
            | SolveError::AdvancedUnderstanding(e)
            | SolveError::Solution(e) => e.is_parse_failure(),
            _ => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SolveError::Config(_) => ErrorKind::Config,
            SolveError::Understanding(PhaseError::Parse(_))
            | SolveError::AdvancedUnderstanding(PhaseError::Parse(_))
            | SolveError::Solution(PhaseError::Parse(_)) => ErrorKind::Parse,
            SolveError::Understanding(PhaseError::Api(e))
            | SolveError::AdvancedUnderstanding(PhaseError::Api(e))
            | SolveError::Solution(PhaseError::Api(e))
            | SolveError::Document(e) => {
                if e.is_timeout() {
                    ErrorKind::Timeout
                } else {
                    ErrorKind::Api
                }
            }
            SolveError::Understanding(PhaseError::Prompt(_))
            | SolveError::AdvancedUnderstanding(PhaseError::Prompt(_))
            | SolveError::Solution(PhaseError::Prompt(_)) => ErrorKind::Internal,
            SolveError::Validation(_) => ErrorKind::Validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PARSE_ERROR_MARKER;

    fn parse_error() -> ParseError {
        ParseError::Unrecoverable {
            message: "expected value at line 1 column 1".to_string(),
            raw: "nope".to_string(),
            processed: "nope".to_string(),
        }
    }

    #[test]
    fn test_understanding_message_keeps_marker() {
        let err = SolveError::Understanding(parse_error().into());
        let message = err.to_string();
        assert!(message.starts_with("Error understanding problem: "));
        assert!(message.contains(PARSE_ERROR_MARKER));
        assert!(err.is_parse_failure());
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_api_errors_are_not_parse_failures() {
        let err = SolveError::Solution(AgentError::ExecutionFailed("503".to_string()).into());
        assert_eq!(
            err.to_string(),
            "Error generating textual solution: Agent execution failed: 503"
        );
        assert!(!err.is_parse_failure());
        assert_eq!(err.kind(), ErrorKind::Api);
    }

    #[test]
    fn test_kinds() {
        let config = SolveError::Config(ConfigError::MissingCredential { vars: vec![] });
        assert_eq!(config.kind(), ErrorKind::Config);
        assert!(!config.is_parse_failure());

        let timeout = SolveError::Understanding(AgentError::Timeout("60s".to_string()).into());
        assert_eq!(timeout.kind(), ErrorKind::Timeout);

        let advanced = SolveError::AdvancedUnderstanding(parse_error().into());
        assert!(advanced.is_parse_failure());
        assert!(
            advanced
                .to_string()
                .starts_with("Error understanding problem (Advanced): ")
        );

        let empty = SolveError::Validation("no steps".to_string());
        assert_eq!(empty.kind(), ErrorKind::Validation);
    }
}
