//! Log and trace output for applications embedding the solver.
//!
//! The orchestrators emit `tracing` spans (`solve`, `attempt`) and events.
//! The extraction and sandbox layers write through the `log` facade; [`init`]
//! forwards those records into the same subscriber so one filter governs
//! both.

use crate::config::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Settings for [`init`].
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Most verbose level recorded for `llm_solver` targets. `RUST_LOG`
    /// directives are applied on top.
    pub level: Level,
    pub target: LogTarget,
    /// Also log when `solve` and `attempt` spans close, with their timings.
    pub span_timings: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            target: LogTarget::default(),
            span_timings: false,
        }
    }
}

impl ObservabilityConfig {
    /// Reads `SOLVER_LOG_LEVEL` (`error` … `trace`) and `SOLVER_LOG_FILE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("SOLVER_LOG_LEVEL") {
            config.level = Level::from_str(raw.trim())
                .map_err(|e| ConfigError::invalid("SOLVER_LOG_LEVEL", format!("'{raw}': {e}")))?;
        }
        if let Some(path) = lookup("SOLVER_LOG_FILE").filter(|p| !p.trim().is_empty()) {
            config.target = LogTarget::File(PathBuf::from(path));
        }
        Ok(config)
    }

    fn filter(&self) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
        let directive = format!("llm_solver={}", self.level).parse()?;
        Ok(EnvFilter::from_default_env().add_directive(directive))
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_timings {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Where formatted records go.
#[derive(Debug, Clone, Default)]
pub enum LogTarget {
    /// Standard error, leaving stdout to the application.
    #[default]
    Stderr,
    Stdout,
    /// Appends to the file, creating it if needed. ANSI colours are off.
    File(PathBuf),
}

/// Installs the global subscriber and the `log` bridge.
///
/// Call once at startup. A second call, or a call after another subscriber
/// or logger was installed, returns an error and changes nothing.
pub fn init(config: ObservabilityConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = config.filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    match &config.target {
        LogTarget::Stderr => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(config.span_events());
            tracing::subscriber::set_global_default(registry.with(layer))?;
        }
        LogTarget::Stdout => {
            let layer = fmt::layer()
                .with_writer(std::io::stdout)
                .with_span_events(config.span_events());
            tracing::subscriber::set_global_default(registry.with(layer))?;
        }
        LogTarget::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let layer = fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_span_events(config.span_events());
            tracing::subscriber::set_global_default(registry.with(layer))?;
        }
    }

    tracing_log::LogTracer::init()?;
    Ok(())
}
