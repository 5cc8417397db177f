//! Progress events pushed by the orchestrators while a solve is in flight.
//!
//! A solve reports `Some(event)` before each model call and `None` once the
//! attempt is over, whether it succeeded or failed. `None` means "nothing in
//! flight" and is always the last thing an attempt reports.
//!
//! # Examples
//!
//! ```rust
//! use llm_solver::progress::{self, Phase, ProgressEvent, ProgressReporter};
//!
//! let (reporter, mut stream) = progress::channel();
//! reporter.report(Some(ProgressEvent::new(Phase::UnderstandingProblem, "Analyzing problem...")));
//! reporter.report(None);
//!
//! let events = stream.try_drain();
//! assert_eq!(events.len(), 2);
//! assert!(events[1].is_none());
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Pipeline stage an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    UnderstandingProblem,
    GeneratingTextualSolution,
    GeneratingVerificationCode,
    SequentialSolving,
}

impl Phase {
    /// Position in the pipeline. Within one attempt, reported ranks never
    /// decrease.
    pub fn rank(self) -> u8 {
        match self {
            Phase::UnderstandingProblem => 0,
            Phase::GeneratingTextualSolution | Phase::SequentialSolving => 1,
            Phase::GeneratingVerificationCode => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Iteration number in advanced mode, 0 otherwise.
    pub current_step: usize,
    /// Always 0: the number of iterations is not known in advance.
    pub total_steps: usize,
    pub step_description: String,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streamed_content: Option<String>,
}

impl ProgressEvent {
    pub fn new(phase: Phase, description: impl Into<String>) -> Self {
        Self {
            current_step: 0,
            total_steps: 0,
            step_description: description.into(),
            phase,
            streamed_content: None,
        }
    }

    pub fn with_step(mut self, step: usize) -> Self {
        self.current_step = step;
        self
    }
}

/// Sink for progress events.
pub trait ProgressReporter: Send + Sync {
    /// `None` signals that no operation is in flight.
    fn report(&self, event: Option<ProgressEvent>);
}

impl<F> ProgressReporter for F
where
    F: Fn(Option<ProgressEvent>) + Send + Sync,
{
    fn report(&self, event: Option<ProgressEvent>) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: Option<ProgressEvent>) {}
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: mpsc::UnboundedSender<Option<ProgressEvent>>,
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, event: Option<ProgressEvent>) {
        if self.sender.send(event).is_err() {
            log::trace!("Progress receiver dropped; event discarded");
        }
    }
}

/// Receiving half of [`channel`].
#[derive(Debug)]
pub struct ProgressStream {
    receiver: mpsc::UnboundedReceiver<Option<ProgressEvent>>,
}

impl ProgressStream {
    /// Waits for the next event. The outer `None` means every reporter was
    /// dropped; the inner `None` is the "nothing in flight" signal.
    pub async fn recv(&mut self) -> Option<Option<ProgressEvent>> {
        self.receiver.recv().await
    }

    /// Takes every event that is already queued.
    pub fn try_drain(&mut self) -> Vec<Option<ProgressEvent>> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Creates a connected reporter/stream pair.
pub fn channel() -> (ChannelReporter, ProgressStream) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ChannelReporter { sender }, ProgressStream { receiver })
}

/// Writer used by the orchestrators for one attempt.
pub(crate) struct Progress<'a> {
    reporter: &'a dyn ProgressReporter,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(reporter: &'a dyn ProgressReporter) -> Self {
        Self { reporter }
    }

    pub(crate) fn phase(&self, phase: Phase, description: &str) {
        tracing::debug!(?phase, description, "Progress");
        self.reporter
            .report(Some(ProgressEvent::new(phase, description)));
    }

    pub(crate) fn sequential_step(&self, step: usize, focus: &str) {
        let description = format!("Thinking about: \"{focus}\"");
        tracing::debug!(step, description = %description, "Progress");
        self.reporter.report(Some(
            ProgressEvent::new(Phase::SequentialSolving, description).with_step(step),
        ));
    }

    pub(crate) fn done(&self) {
        self.reporter.report(None);
    }
}
