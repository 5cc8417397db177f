//! 'llm-solver' - Structured, multi-step problem solving on top of a chat model.
//!
//! The crate turns a problem statement (optionally with an image or a
//! document) into a validated, structured solution by orchestrating a
//! sequence of model calls. It focuses on the parts that go wrong between a
//! strongly-typed application and free-form model output:
//!
//! - [`extract`] recovers JSON from replies that wrap it in fences, prose or
//!   trailing commas.
//! - [`sandbox`] runs model-written calculation snippets in an isolated,
//!   resource-bounded interpreter.
//! - [`orchestrator`] sequences the calls for the standard
//!   (understand, solve, verify) and advanced (iterative steps) modes and
//!   retries once when a reply cannot be parsed.
//! - [`progress`] streams phase updates to a UI while a solve runs.
//!
//! The LLM itself is an external collaborator: implement [`agent::Agent`]
//! with `Output = String` for your backend.

pub mod agent;
pub mod config;
pub mod error;
pub mod extract;
pub mod multimodal;
pub mod observability;
pub mod orchestrator;
pub mod progress;
pub mod prompts;
pub mod sandbox;
pub mod subject;
pub mod types;

pub use agent::{Agent, AgentError, Document, DocumentHandle, DocumentStore, Payload};
pub use config::{ConfigError, SolverConfig};
pub use error::{ErrorKind, PhaseError, SolveError};
pub use extract::{ParseError, sanitize_and_parse};
pub use multimodal::ImageData;
pub use orchestrator::{SolveRequest, Solver};
pub use progress::{ProgressEvent, ProgressReporter};
pub use sandbox::{CodeSandbox, ExecValue, Execution, SandboxConfig};
pub use subject::{SubjectType, detect_subject};
pub use types::{
    Mode, ProblemUnderstanding, SequentialSolution, SequentialStepOutput, SolutionStep,
    SolveOutcome, SolveResult, StandardSolution,
};
