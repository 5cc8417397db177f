//! Data model of a solve: the model's structured replies and the aggregate
//! result handed back to the caller.
//!
//! Field names on the wire are camelCase so the same types describe both the
//! JSON the model is asked to produce and the JSON a UI consumes.

use crate::error::SolveError;
use crate::sandbox::{CodeSandbox, ExecValue, Execution};
use crate::subject::SubjectType;
use serde::{Deserialize, Serialize};

/// Which pipeline runs a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Understand, solve and verify in three calls.
    #[default]
    Standard,
    /// Understand, then iterate model-driven steps.
    Advanced,
}

/// The model's analysis of the problem. Produced once per solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemUnderstanding {
    pub restated_problem: String,
    #[serde(default)]
    pub key_information: Vec<String>,
    #[serde(default)]
    pub problem_goal: String,
    #[serde(default)]
    pub image_acknowledgement: String,
}

/// One step of a standard-mode textual solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionStep {
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// One iteration of the sequential engine, as appended to its history.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequentialStepOutput {
    pub step_explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_js_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_js_code_result: Option<ExecValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_js_code_error: Option<String>,
}

impl SequentialStepOutput {
    /// A step that carries only an explanation (halt notes, error entries).
    pub fn note(explanation: impl Into<String>) -> Self {
        Self {
            step_explanation: explanation.into(),
            ..Self::default()
        }
    }
}

/// Reply schema of the textual-solution call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TextualSolutionReply {
    #[serde(default)]
    pub solution_steps: Vec<SolutionStep>,
    #[serde(default)]
    pub final_answer: String,
}

/// Reply schema of the verification-code call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerificationReply {
    #[serde(default)]
    pub verification_code: Option<String>,
}

/// Reply schema of one sequential step.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SequentialStepReply {
    pub step_explanation: String,
    #[serde(default)]
    pub step_js_code: Option<String>,
    #[serde(default)]
    pub is_this_the_final_step: bool,
    #[serde(default)]
    pub focus_for_next_step: Option<String>,
}

/// Standard-mode deliverable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardSolution {
    pub solution_steps: Vec<SolutionStep>,
    pub final_answer: String,
    /// Empty when the verification phase failed or returned nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
}

impl StandardSolution {
    /// Runs the verification code in `sandbox`. `None` when there is no code.
    pub fn run_verification(&self, sandbox: &CodeSandbox) -> Option<Execution> {
        self.verification_code
            .as_deref()
            .map(|code| sandbox.execute(code))
    }
}

/// Advanced-mode deliverable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequentialSolution {
    /// Every iteration in order, including a trailing halt or error note.
    pub steps: Vec<SequentialStepOutput>,
    /// Snippet result of the final step, if it had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_computed_answer: Option<ExecValue>,
    pub final_summary_text: String,
    /// True when the iteration cap ended the loop.
    #[serde(default)]
    pub halted: bool,
}

/// The mode-specific part of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SolveOutcome {
    Standard(StandardSolution),
    Sequential(SequentialSolution),
}

/// Everything a successful solve returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResult {
    pub problem_understanding: ProblemUnderstanding,
    pub subject: SubjectType,
    pub outcome: SolveOutcome,
}

impl SolveResult {
    pub fn mode(&self) -> Mode {
        match self.outcome {
            SolveOutcome::Standard(_) => Mode::Standard,
            SolveOutcome::Sequential(_) => Mode::Advanced,
        }
    }

    pub fn standard_solution(&self) -> Option<&StandardSolution> {
        match &self.outcome {
            SolveOutcome::Standard(solution) => Some(solution),
            SolveOutcome::Sequential(_) => None,
        }
    }

    pub fn solution_steps(&self) -> Option<&[SolutionStep]> {
        self.standard_solution()
            .map(|solution| solution.solution_steps.as_slice())
    }

    pub fn sequential_solution(&self) -> Option<&SequentialSolution> {
        match &self.outcome {
            SolveOutcome::Sequential(solution) => Some(solution),
            SolveOutcome::Standard(_) => None,
        }
    }

    /// Rejects results that are structurally present but carry nothing to show.
    pub fn validate(&self) -> Result<(), SolveError> {
        match &self.outcome {
            SolveOutcome::Standard(solution) => {
                if solution.solution_steps.is_empty() && solution.final_answer.trim().is_empty() {
                    return Err(SolveError::Validation(
                        "The model returned neither solution steps nor a final answer.".to_string(),
                    ));
                }
            }
            SolveOutcome::Sequential(solution) => {
                if solution.steps.is_empty() {
                    return Err(SolveError::Validation(
                        "Advanced mode finished without producing any steps.".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn understanding() -> ProblemUnderstanding {
        ProblemUnderstanding {
            restated_problem: "Find P(X >= 7)".to_string(),
            key_information: vec!["n = 10".to_string()],
            problem_goal: "The probability".to_string(),
            image_acknowledgement: "No image was provided.".to_string(),
        }
    }

    #[test]
    fn test_understanding_wire_names() {
        let parsed: ProblemUnderstanding = serde_json::from_value(json!({
            "restatedProblem": "Find P(X >= 7)",
            "keyInformation": ["n = 10"],
            "problemGoal": "The probability",
            "imageAcknowledgement": "No image was provided."
        }))
        .unwrap();
        assert_eq!(parsed, understanding());
    }

    #[test]
    fn test_understanding_optional_fields_default() {
        let parsed: ProblemUnderstanding =
            serde_json::from_value(json!({ "restatedProblem": "x" })).unwrap();
        assert!(parsed.key_information.is_empty());
        assert!(parsed.problem_goal.is_empty());
    }

    #[test]
    fn test_step_reply_defaults() {
        let reply: SequentialStepReply =
            serde_json::from_value(json!({ "stepExplanation": "think" })).unwrap();
        assert!(!reply.is_this_the_final_step);
        assert!(reply.step_js_code.is_none());
        assert!(reply.focus_for_next_step.is_none());
    }

    #[test]
    fn test_outcome_is_tagged_by_mode() {
        let result = SolveResult {
            problem_understanding: understanding(),
            subject: SubjectType::ProbabilityStatistics,
            outcome: SolveOutcome::Sequential(SequentialSolution {
                steps: vec![SequentialStepOutput::note("done")],
                final_computed_answer: Some(ExecValue::Number(0.171875)),
                final_summary_text: "done".to_string(),
                halted: false,
            }),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["subject"], "probability_statistics");
        assert_eq!(value["outcome"]["mode"], "sequential");
        assert_eq!(value["outcome"]["finalComputedAnswer"], 0.171875);
        assert!(value["outcome"].get("solutionSteps").is_none());

        let back: SolveResult = serde_json::from_value(value).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.mode(), Mode::Advanced);
        assert!(back.solution_steps().is_none());
    }

    #[test]
    fn test_validate_standard() {
        let mut result = SolveResult {
            problem_understanding: understanding(),
            subject: SubjectType::GeneralMath,
            outcome: SolveOutcome::Standard(StandardSolution {
                solution_steps: vec![],
                final_answer: "  ".to_string(),
                verification_code: None,
            }),
        };
        assert!(matches!(result.validate(), Err(SolveError::Validation(_))));

        result.outcome = SolveOutcome::Standard(StandardSolution {
            solution_steps: vec![],
            final_answer: "42".to_string(),
            verification_code: None,
        });
        assert!(result.validate().is_ok());
        assert_eq!(result.solution_steps().map(<[_]>::len), Some(0));
    }

    #[test]
    fn test_run_verification() {
        let mut solution = StandardSolution {
            solution_steps: vec![],
            final_answer: "0.5".to_string(),
            verification_code: None,
        };
        let sandbox = CodeSandbox::new();
        assert!(solution.run_verification(&sandbox).is_none());

        solution.verification_code = Some("return 1 / 2;".to_string());
        let execution = solution.run_verification(&sandbox).unwrap();
        assert_eq!(execution.result, Some(ExecValue::Number(0.5)));
    }

    #[test]
    fn test_validate_empty_sequential() {
        let result = SolveResult {
            problem_understanding: understanding(),
            subject: SubjectType::GeneralMath,
            outcome: SolveOutcome::Sequential(SequentialSolution {
                steps: vec![],
                final_computed_answer: None,
                final_summary_text: String::new(),
                halted: false,
            }),
        };
        assert!(result.validate().is_err());
    }
}
