//! Whole-pipeline retry on unparseable model output.

use crate::error::SolveError;
use std::future::Future;
use tracing::{error, info, warn};

/// Runs `attempt` until it succeeds, fails with a non-parse error, or has
/// been tried `max_retries + 1` times. The last error is returned unchanged.
///
/// `attempt` receives the 1-based attempt number.
pub(crate) async fn with_parse_retry<F, Fut, T>(
    max_retries: u32,
    mut attempt: F,
) -> Result<T, SolveError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, SolveError>>,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        match attempt(attempts).await {
            Ok(output) => {
                if attempts > 1 {
                    info!(
                        attempt = attempts,
                        max_attempts = max_retries + 1,
                        "Solve succeeded after retry"
                    );
                }
                return Ok(output);
            }
            Err(e) if e.is_parse_failure() && attempts <= max_retries => {
                warn!(
                    attempt = attempts,
                    max_attempts = max_retries + 1,
                    error = %e,
                    "Could not parse model output; retrying the whole pipeline"
                );
            }
            Err(e) => {
                if e.is_parse_failure() {
                    error!(attempts, error = %e, "Parse retries exhausted");
                } else {
                    error!(error = %e, "Solve failed with a non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentError;
    use crate::config::ConfigError;
    use crate::extract::ParseError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn parse_failure() -> SolveError {
        SolveError::Understanding(
            ParseError::Unrecoverable {
                message: "expected value".to_string(),
                raw: "oops".to_string(),
                processed: "oops".to_string(),
            }
            .into(),
        )
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_parse_retry(1, move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, SolveError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parse_failure_retried_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_parse_retry(1, move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(parse_failure())
        })
        .await;
        assert!(result.unwrap_err().is_parse_failure());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_recovers_on_second_attempt() {
        let result = with_parse_retry(1, |attempt| async move {
            if attempt == 1 {
                Err(parse_failure())
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = with_parse_retry(3, move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(SolveError::Solution(
                AgentError::ProcessError("connection refused".to_string()).into(),
            ))
        })
        .await;
        assert!(!result.unwrap_err().is_parse_failure());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let config: Result<(), _> = with_parse_retry(3, move |_| async move {
            Err(SolveError::Config(ConfigError::invalid("model", "empty")))
        })
        .await;
        assert!(matches!(config, Err(SolveError::Config(_))));
    }

    #[tokio::test]
    async fn test_zero_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let _: Result<(), _> = with_parse_retry(0, move |_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(parse_failure())
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
