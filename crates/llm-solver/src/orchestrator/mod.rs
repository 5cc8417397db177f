//! Solve pipelines.
//!
//! [`Solver::solve`] checks the configuration, uploads the optional document,
//! then runs the pipeline for the requested [`Mode`] under the parse-retry
//! wrapper:
//!
//! - **Standard**: understand, generate the textual solution, generate
//!   verification code. Only the first two calls are essential.
//! - **Advanced**: understand, then ask the model for one step at a time until
//!   it declares the final step or the iteration cap is reached.
//!
//! Model calls are strictly sequential; every phase depends on the previous
//! one. Progress goes to the configured [`ProgressReporter`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use llm_solver::agent::{Agent, AgentError, Payload};
//! use llm_solver::{Mode, SolveRequest, Solver, SolverConfig};
//!
//! struct Backend;
//!
//! #[async_trait::async_trait]
//! impl Agent for Backend {
//!     type Output = String;
//!     fn expertise(&self) -> &str {
//!         "Gemini"
//!     }
//!     async fn execute(&self, payload: Payload) -> Result<String, AgentError> {
//!         unimplemented!("call the vendor API with {}", payload.to_text())
//!     }
//! }
//!
//! # async fn run() -> Result<(), llm_solver::SolveError> {
//! let solver = Solver::new(Backend, SolverConfig::from_env()?);
//! let result = solver
//!     .solve(SolveRequest::new("Calculate the probability of at least 7 heads in 10 coin tosses")
//!         .with_mode(Mode::Advanced))
//!     .await?;
//! println!("{}", result.sequential_solution().map(|s| s.final_summary_text.as_str()).unwrap_or(""));
//! # Ok(())
//! # }
//! ```

mod retry;
mod sequential;
mod standard;

use crate::agent::{Agent, Document, DocumentHandle, DocumentStore, Payload};
use crate::config::{ConfigError, SolverConfig};
use crate::error::{PhaseError, SolveError};
use crate::extract::sanitize_and_parse;
use crate::multimodal::ImageData;
use crate::progress::{NoopReporter, Phase, Progress, ProgressReporter};
use crate::prompts::{self, PromptContext};
use crate::sandbox::{CodeSandbox, Execution};
use crate::subject::{SubjectType, detect_subject};
use crate::types::{Mode, ProblemUnderstanding, SolveResult};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

/// One problem to solve.
#[derive(Debug, Clone)]
pub struct SolveRequest {
    pub problem: String,
    pub image: Option<ImageData>,
    pub document: Option<Document>,
    pub mode: Mode,
    /// Detected from the problem text when absent.
    pub subject: Option<SubjectType>,
}

impl SolveRequest {
    pub fn new(problem: impl Into<String>) -> Self {
        Self {
            problem: problem.into(),
            image: None,
            document: None,
            mode: Mode::Standard,
            subject: None,
        }
    }

    pub fn with_image(mut self, image: ImageData) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_subject(mut self, subject: SubjectType) -> Self {
        self.subject = Some(subject);
        self
    }
}

/// Entry point: runs solve requests against an LLM collaborator.
///
/// Holds no per-request state, so one solver can serve concurrent requests.
pub struct Solver<A> {
    agent: A,
    config: SolverConfig,
    sandbox: CodeSandbox,
    reporter: Arc<dyn ProgressReporter>,
    documents: Option<Arc<dyn DocumentStore>>,
}

impl<A: Agent<Output = String>> Solver<A> {
    pub fn new(agent: A, config: SolverConfig) -> Self {
        let sandbox = CodeSandbox::with_config(config.sandbox.clone());
        Self {
            agent,
            config,
            sandbox,
            reporter: Arc::new(NoopReporter),
            documents: None,
        }
    }

    /// Sends progress events to `reporter`.
    pub fn with_reporter(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Enables document-grounded requests.
    pub fn with_document_store(mut self, store: impl DocumentStore + 'static) -> Self {
        self.documents = Some(Arc::new(store));
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// The sandbox step snippets run in, configured from `config.sandbox`.
    pub fn sandbox(&self) -> &CodeSandbox {
        &self.sandbox
    }

    /// Solves one problem.
    ///
    /// Fails fast with [`SolveError::Config`] before any collaborator call when
    /// the credential is missing or the request is unusable. Parse failures
    /// rerun the whole pipeline up to `max_parse_retries` times; every other
    /// error is returned immediately. The reporter's last event is always
    /// `None`, whichever way the call ends.
    pub async fn solve(&self, request: SolveRequest) -> Result<SolveResult, SolveError> {
        if let Err(e) = self.preflight(&request) {
            Progress::new(self.reporter.as_ref()).done();
            return Err(e);
        }

        let subject = request
            .subject
            .unwrap_or_else(|| detect_subject(&request.problem));
        let mode = request.mode;

        async move {
            let handle = match &request.document {
                Some(document) => match self.upload(document).await {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        Progress::new(self.reporter.as_ref()).done();
                        return Err(e);
                    }
                },
                None => None,
            };

            let request_ref = &request;
            let handle_ref = handle.as_ref();
            let outcome = retry::with_parse_retry(self.config.max_parse_retries, move |attempt| {
                self.attempt(request_ref, subject, handle_ref, attempt)
            })
            .await;

            if let Some(handle) = &handle {
                self.release(handle).await;
            }

            let result = outcome?;
            result.validate()?;
            info!("Solve completed");
            Ok(result)
        }
        .instrument(info_span!(
            "solve",
            mode = ?mode,
            subject = subject.id(),
            agent = self.agent.expertise()
        ))
        .await
    }

    /// Checks that run before any collaborator call.
    fn preflight(&self, request: &SolveRequest) -> Result<(), SolveError> {
        self.config.require_api_key()?;
        self.config.validate()?;
        if request.problem.trim().is_empty() && request.image.is_none() {
            return Err(
                ConfigError::invalid("problem", "provide a problem description or an image").into(),
            );
        }
        if let Some(image) = &request.image {
            image
                .validate()
                .map_err(|reason| ConfigError::invalid("image", reason))?;
        }
        Ok(())
    }

    async fn attempt(
        &self,
        request: &SolveRequest,
        subject: SubjectType,
        document: Option<&DocumentHandle>,
        attempt: u32,
    ) -> Result<SolveResult, SolveError> {
        let session = Session {
            agent: &self.agent,
            sandbox: &self.sandbox,
            progress: Progress::new(self.reporter.as_ref()),
            problem: &request.problem,
            image: request.image.as_ref(),
            document,
            mode: request.mode,
            subject,
            max_sequential_steps: self.config.max_sequential_steps,
        };

        let result = async {
            match request.mode {
                Mode::Standard => standard::run(&session).await,
                Mode::Advanced => sequential::run(&session).await,
            }
        }
        .instrument(info_span!("attempt", attempt))
        .await;
        session.progress.done();
        result
    }

    async fn upload(&self, document: &Document) -> Result<DocumentHandle, SolveError> {
        let store = self.documents.as_ref().ok_or_else(|| {
            ConfigError::invalid(
                "document_store",
                "a document was supplied but no DocumentStore is configured",
            )
        })?;
        let handle = store.upload(document).await.map_err(SolveError::Document)?;
        debug!(document = %document.name, id = %handle.id, "Document uploaded");
        Ok(handle)
    }

    async fn release(&self, handle: &DocumentHandle) {
        if let Some(store) = &self.documents
            && let Err(e) = store.delete(handle).await
        {
            warn!(id = %handle.id, error = %e, "Failed to delete uploaded document");
        }
    }
}

/// Everything one attempt needs; borrowed from the solver and the request.
pub(crate) struct Session<'a, A> {
    agent: &'a A,
    sandbox: &'a CodeSandbox,
    pub(crate) progress: Progress<'a>,
    problem: &'a str,
    image: Option<&'a ImageData>,
    document: Option<&'a DocumentHandle>,
    mode: Mode,
    pub(crate) subject: SubjectType,
    pub(crate) max_sequential_steps: usize,
}

impl<'a, A: Agent<Output = String>> Session<'a, A> {
    /// Prompt values for this attempt, with `understanding` as the replayed context.
    pub(crate) fn prompts<'b>(&'b self, understanding: &'b str) -> PromptContext<'b> {
        PromptContext {
            problem: self.problem,
            image_note: prompts::image_note(self.mode, self.image.is_some()),
            subject: self.subject.config(),
            understanding,
        }
    }

    /// Sends a rendered prompt with the problem's attachments and parses the reply.
    pub(crate) async fn ask<T: DeserializeOwned>(
        &self,
        prompt: Result<String, minijinja::Error>,
    ) -> Result<T, PhaseError> {
        let mut payload = Payload::new();
        if let Some(image) = self.image {
            payload = payload.with_image(image.clone());
        }
        if let Some(handle) = self.document {
            payload = payload.with_document(handle.clone());
        }
        let payload = payload.with_text(prompt?);

        let raw = self.agent.execute(payload).await?;
        debug!(len = raw.len(), "Model reply received");
        Ok(sanitize_and_parse(&raw)?)
    }

    /// The understanding phase shared by both modes. Failure aborts the solve.
    pub(crate) async fn understand(&self) -> Result<ProblemUnderstanding, SolveError> {
        self.progress
            .phase(Phase::UnderstandingProblem, "Analyzing problem...");
        let understanding: ProblemUnderstanding = self
            .ask(self.prompts("").understanding_prompt())
            .await
            .map_err(|e| match self.mode {
                Mode::Standard => SolveError::Understanding(e),
                Mode::Advanced => SolveError::AdvancedUnderstanding(e),
            })?;
        info!(
            key_facts = understanding.key_information.len(),
            "Problem understood"
        );
        Ok(understanding)
    }

    /// Runs a snippet off the async executor.
    pub(crate) async fn execute_snippet(&self, code: &str) -> Execution {
        let sandbox = self.sandbox.clone();
        let code = code.to_string();
        tokio::task::spawn_blocking(move || sandbox.execute(&code))
            .await
            .unwrap_or_else(|e| Execution::failure(format!("Sandbox failure: {e}")))
    }
}
