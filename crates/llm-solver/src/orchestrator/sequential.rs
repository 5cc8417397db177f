//! Advanced mode: a bounded loop of model-driven steps.
//!
//! Each iteration sends the full history plus the current focus and appends
//! exactly one entry. The loop ends when the model declares the final step,
//! when a step cannot be obtained (an error entry is appended), or at the
//! iteration cap (a halt entry is appended).

use super::Session;
use crate::agent::Agent;
use crate::error::SolveError;
use crate::prompts::format_understanding;
use crate::sandbox::{ExecValue, clean_snippet};
use crate::types::{
    SequentialSolution, SequentialStepOutput, SequentialStepReply, SolveOutcome, SolveResult,
};
use tracing::{debug, info, warn};

/// Focus of the first iteration when the understanding has no goal.
const INITIAL_FOCUS: &str = "Achieve the main goal of the problem by thinking step-by-step.";

/// Focus used when the model does not name the next one.
const FALLBACK_FOCUS: &str = "Summarize findings and conclude.";

enum Ending {
    Final(Option<ExecValue>),
    Failed,
    Halted,
}

pub(crate) async fn run<A: Agent<Output = String>>(
    session: &Session<'_, A>,
) -> Result<SolveResult, SolveError> {
    let understanding = session.understand().await?;
    let context = format_understanding(&understanding);
    let prompts = session.prompts(&context);

    let max_steps = session.max_sequential_steps;
    let mut history: Vec<SequentialStepOutput> = Vec::new();
    let mut focus = non_blank(Some(understanding.problem_goal.clone()))
        .unwrap_or_else(|| INITIAL_FOCUS.to_string());
    let mut ending = Ending::Halted;

    for step in 1..=max_steps {
        session.progress.sequential_step(step, &focus);

        let reply: SequentialStepReply =
            match session.ask(prompts.sequential_step_prompt(&history, &focus)).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(step, error = %e, "Sequential step failed; ending the loop");
                    history.push(SequentialStepOutput::note(format!(
                        "**Error processing AI response for sequential step (focus: \"{focus}\"):**\n\n```\n{e}\n```"
                    )));
                    ending = Ending::Failed;
                    break;
                }
            };

        let SequentialStepReply {
            step_explanation,
            step_js_code,
            is_this_the_final_step,
            focus_for_next_step,
        } = reply;

        let output = run_step(session, step, step_explanation, step_js_code).await;
        let result = output.step_js_code_result.clone();
        history.push(output);

        if is_this_the_final_step {
            info!(step, "Model declared the final step");
            ending = Ending::Final(result);
            break;
        }
        focus = non_blank(focus_for_next_step).unwrap_or_else(|| FALLBACK_FOCUS.to_string());
    }

    let (final_computed_answer, halted) = match ending {
        Ending::Final(answer) => (answer, false),
        Ending::Failed => (None, false),
        Ending::Halted => {
            warn!(max_steps, "Sequential step cap reached without a final step");
            history.push(SequentialStepOutput::note(format!(
                "**Advanced mode exceeded maximum sequential steps ({max_steps}). Process halted.**\n\nCurrent focus was: \"{focus}\""
            )));
            (None, true)
        }
    };

    // The last entry is the final step, the error note or the halt note.
    let final_summary_text = history
        .last()
        .map(|step| step.step_explanation.clone())
        .unwrap_or_default();

    Ok(SolveResult {
        problem_understanding: understanding,
        subject: session.subject,
        outcome: SolveOutcome::Sequential(SequentialSolution {
            steps: history,
            final_computed_answer,
            final_summary_text,
            halted,
        }),
    })
}

/// Builds the history entry for one reply, running its snippet if it has one.
async fn run_step<A: Agent<Output = String>>(
    session: &Session<'_, A>,
    step: usize,
    explanation: String,
    code: Option<String>,
) -> SequentialStepOutput {
    let mut output = SequentialStepOutput {
        step_explanation: explanation,
        step_js_code: non_blank(code),
        ..SequentialStepOutput::default()
    };

    let Some(code) = output.step_js_code.as_deref() else {
        return output;
    };
    if clean_snippet(code).is_empty() {
        debug!(step, "Step code is empty after cleaning; not executed");
        return output;
    }

    let execution = session.execute_snippet(code).await;
    if let Some(error) = &execution.error {
        warn!(step, error = %error, "Step code failed");
    }
    output.step_js_code_result = execution.result;
    output.step_js_code_error = execution.error;
    output
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}
