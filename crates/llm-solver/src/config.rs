//! Configuration for solver behavior.

use crate::sandbox::SandboxConfig;
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Environment variables consulted for the API credential, in order.
pub const API_KEY_VARS: &[&str] = &["API_KEY", "GEMINI_API_KEY"];

const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration errors. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// None of the credential variables is set.
    #[error("API credential is not configured (set one of: {})", .vars.join(", "))]
    MissingCredential { vars: Vec<String> },

    /// A setting has an unusable value.
    #[error("Invalid configuration for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Configuration for a [`Solver`](crate::Solver).
///
/// # Examples
///
/// ```
/// use llm_solver::SolverConfig;
///
/// let config = SolverConfig::default()
///     .with_api_key("secret")
///     .with_max_sequential_steps(6);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.require_api_key().unwrap(), "secret");
/// ```
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Credential for the LLM backend. The solver only checks that it is
    /// present; the agent implementation is what uses it.
    pub api_key: Option<String>,

    /// Model identifier passed through to the agent implementation.
    ///
    /// **Default:** `gemini-2.5-flash`
    pub model: String,

    /// Iteration cap of the sequential step engine.
    ///
    /// When the cap is reached without the model declaring a final step, the
    /// engine halts and appends a synthetic explanation entry.
    ///
    /// **Default:** 10
    pub max_sequential_steps: usize,

    /// Extra attempts of the whole pipeline after a parse failure.
    ///
    /// **Default:** 1 (two attempts in total)
    pub max_parse_retries: u32,

    /// Limits applied to every snippet execution.
    pub sandbox: SandboxConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_sequential_steps: 10,
            max_parse_retries: 1,
            sandbox: SandboxConfig::default(),
        }
    }
}

impl SolverConfig {
    /// Builds a configuration from the process environment.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `API_KEY`, then `GEMINI_API_KEY` | `api_key` |
    /// | `SOLVER_MODEL` | `model` |
    /// | `SOLVER_MAX_SEQUENTIAL_STEPS` | `max_sequential_steps` |
    /// | `SOLVER_MAX_PARSE_RETRIES` | `max_parse_retries` |
    /// | `SOLVER_SANDBOX_STEP_BUDGET` | `sandbox.step_budget` |
    ///
    /// A missing credential is not an error here; it is reported by
    /// [`require_api_key`](Self::require_api_key) when a solve starts.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self {
            api_key: API_KEY_VARS
                .iter()
                .find_map(|var| lookup(*var).filter(|v| !v.trim().is_empty())),
            ..Self::default()
        };

        if let Some(model) = lookup("SOLVER_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        if let Some(steps) = parse_var(&lookup, "SOLVER_MAX_SEQUENTIAL_STEPS")? {
            config.max_sequential_steps = steps;
        }
        if let Some(retries) = parse_var(&lookup, "SOLVER_MAX_PARSE_RETRIES")? {
            config.max_parse_retries = retries;
        }
        if let Some(budget) = parse_var(&lookup, "SOLVER_SANDBOX_STEP_BUDGET")? {
            config.sandbox.step_budget = budget;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_sequential_steps(mut self, steps: usize) -> Self {
        self.max_sequential_steps = steps;
        self
    }

    pub fn with_max_parse_retries(mut self, retries: u32) -> Self {
        self.max_parse_retries = retries;
        self
    }

    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Returns the credential, or `MissingCredential` when it is absent or blank.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingCredential {
                vars: API_KEY_VARS.iter().map(|v| v.to_string()).collect(),
            }),
        }
    }

    /// Rejects settings that would make a solve impossible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sequential_steps == 0 {
            return Err(ConfigError::invalid(
                "max_sequential_steps",
                "must be at least 1",
            ));
        }
        if self.sandbox.step_budget == 0 {
            return Err(ConfigError::invalid(
                "sandbox.step_budget",
                "must be at least 1",
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::invalid("model", "must not be empty"));
        }
        Ok(())
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::invalid(key, format!("'{raw}': {e}"))),
    }
}
