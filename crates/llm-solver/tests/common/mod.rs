//! Shared fixtures for the solver integration tests.

#![allow(dead_code)]

use llm_solver::agent::{Agent, AgentError, Document, DocumentHandle, DocumentStore, Payload};
use llm_solver::progress::ProgressEvent;
use llm_solver::{Solver, SolverConfig};
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const COIN_TOSS_PROBLEM: &str =
    "Calculate the probability of at least 7 heads in 10 coin tosses";

/// Binomial tail P(X >= 7) for n = 10, p = 1/2.
pub const COIN_TOSS_CODE: &str = r#"
// P(X >= 7) = sum_{k=7}^{10} C(10, k) / 2^10
function choose(n, k) {
  let result = 1;
  for (let i = 1; i <= k; i++) {
    result = result * (n - k + i) / i;
  }
  return result;
}
let total = 0;
for (let k = 7; k <= 10; k++) {
  total += choose(10, k);
}
return total / Math.pow(2, 10);
"#;

/// Which pipeline call a prompt belongs to, recognised by its reply schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Understanding,
    Solution,
    Verification,
    Step,
}

impl Call {
    pub fn of(prompt: &str) -> Self {
        if prompt.contains("\"isThisTheFinalStep\"") {
            Call::Step
        } else if prompt.contains("\"verificationCode\"") {
            Call::Verification
        } else if prompt.contains("\"solutionSteps\"") {
            Call::Solution
        } else {
            Call::Understanding
        }
    }
}

type Responder = dyn Fn(Call, usize, &str) -> Result<String, AgentError> + Send + Sync;

/// Agent whose replies come from a closure.
///
/// The closure receives the call kind, how many calls of that kind came
/// before (0-based) and the prompt text.
pub struct ScriptedAgent {
    responder: Box<Responder>,
    counts: Mutex<HashMap<Call, usize>>,
    payloads: Mutex<Vec<Payload>>,
}

impl ScriptedAgent {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(Call, usize, &str) -> Result<String, AgentError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            counts: Mutex::new(HashMap::new()),
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Total number of calls received.
    pub fn calls(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    pub fn calls_of(&self, call: Call) -> usize {
        self.counts.lock().unwrap().get(&call).copied().unwrap_or(0)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .map(Payload::to_text)
            .collect()
    }

    pub fn payloads(&self) -> Vec<Payload> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Agent for ScriptedAgent {
    type Output = String;

    fn expertise(&self) -> &str {
        "Scripted test agent"
    }

    async fn execute(&self, payload: Payload) -> Result<String, AgentError> {
        let prompt = payload.to_text();
        let call = Call::of(&prompt);
        let index = {
            let mut counts = self.counts.lock().unwrap();
            let count = counts.entry(call).or_insert(0);
            let index = *count;
            *count += 1;
            index
        };
        self.payloads.lock().unwrap().push(payload);
        (self.responder)(call, index, &prompt)
    }
}

/// Document store that records what happened to each document.
#[derive(Clone, Default)]
pub struct RecordingStore {
    pub uploaded: Arc<Mutex<Vec<String>>>,
    pub deleted: Arc<Mutex<Vec<String>>>,
    pub fail_upload: bool,
}

#[async_trait::async_trait]
impl DocumentStore for RecordingStore {
    async fn upload(&self, document: &Document) -> Result<DocumentHandle, AgentError> {
        if self.fail_upload {
            return Err(AgentError::ProcessError("upload rejected".to_string()));
        }
        self.uploaded.lock().unwrap().push(document.name.clone());
        Ok(DocumentHandle::new(
            format!("files/{}", document.name),
            document.mime_type.clone(),
        ))
    }

    async fn delete(&self, handle: &DocumentHandle) -> Result<(), AgentError> {
        self.deleted.lock().unwrap().push(handle.id.clone());
        Ok(())
    }
}

pub fn config() -> SolverConfig {
    SolverConfig::default().with_api_key("test-key")
}

pub fn solver(agent: ScriptedAgent) -> Solver<ScriptedAgent> {
    Solver::new(agent, config())
}

/// Collects every progress event in a shared vector.
pub fn recorder() -> (
    impl Fn(Option<ProgressEvent>) + Send + Sync + 'static,
    Arc<Mutex<Vec<Option<ProgressEvent>>>>,
) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    (
        move |event: Option<ProgressEvent>| sink.lock().unwrap().push(event),
        events,
    )
}

pub fn understanding_json() -> JsonValue {
    json!({
        "restatedProblem": "Find $P(X \\ge 7)$ where $X \\sim \\mathrm{Bin}(10, 0.5)$.",
        "keyInformation": ["$n = 10$ tosses", "$p = 0.5$ per toss"],
        "problemGoal": "Compute the probability of at least 7 heads",
        "imageAcknowledgement": "No image was provided."
    })
}

pub fn solution_json() -> JsonValue {
    json!({
        "solutionSteps": [
            { "explanation": "Model the count of heads as $X \\sim \\mathrm{Bin}(10, 0.5)$." },
            { "explanation": "Sum $\\binom{10}{k}$ for $k = 7..10$: $120 + 45 + 10 + 1 = 176$." }
        ],
        "finalAnswer": "$P(X \\ge 7) = 176/1024 \\approx 0.171875$"
    })
}

pub fn verification_json(code: &str) -> JsonValue {
    json!({ "verificationCode": code })
}

pub fn step_json(explanation: &str, code: Option<&str>, last: bool, next: Option<&str>) -> JsonValue {
    let mut step = json!({
        "stepExplanation": explanation,
        "isThisTheFinalStep": last,
    });
    if let Some(code) = code {
        step["stepJsCode"] = json!(code);
    }
    if let Some(next) = next {
        step["focusForNextStep"] = json!(next);
    }
    step
}

/// Wraps a JSON value the way chatty models do.
pub fn fenced(value: &JsonValue) -> String {
    format!("```json\n{}\n```", serde_json::to_string_pretty(value).unwrap())
}

pub fn with_prose(value: &JsonValue) -> String {
    format!("Sure! Here is the JSON you asked for:\n{value}\nLet me know if you need more.")
}
