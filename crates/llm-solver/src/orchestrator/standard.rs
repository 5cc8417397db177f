//! Standard mode: understand, solve, verify.

use super::Session;
use crate::agent::Agent;
use crate::error::SolveError;
use crate::progress::Phase;
use crate::prompts::{PromptContext, format_understanding, summarize_solution};
use crate::types::{
    SolveOutcome, SolveResult, StandardSolution, TextualSolutionReply, VerificationReply,
};
use tracing::{info, warn};

pub(crate) async fn run<A: Agent<Output = String>>(
    session: &Session<'_, A>,
) -> Result<SolveResult, SolveError> {
    let understanding = session.understand().await?;
    let context = format_understanding(&understanding);
    let prompts = session.prompts(&context);

    session
        .progress
        .phase(Phase::GeneratingTextualSolution, "Generating textual solution...");
    let solution: TextualSolutionReply = session
        .ask(prompts.solution_prompt())
        .await
        .map_err(SolveError::Solution)?;
    info!(
        steps = solution.solution_steps.len(),
        "Textual solution generated"
    );

    session
        .progress
        .phase(Phase::GeneratingVerificationCode, "Generating verification code...");
    let verification_code = generate_verification(session, &prompts, &solution).await;

    Ok(SolveResult {
        problem_understanding: understanding,
        subject: session.subject,
        outcome: SolveOutcome::Standard(StandardSolution {
            solution_steps: solution.solution_steps,
            final_answer: solution.final_answer,
            verification_code,
        }),
    })
}

// Never fails the solve: errors are logged and the code is left empty.
async fn generate_verification<A: Agent<Output = String>>(
    session: &Session<'_, A>,
    prompts: &PromptContext<'_>,
    solution: &TextualSolutionReply,
) -> Option<String> {
    let summary = summarize_solution(&solution.solution_steps, &solution.final_answer);
    match session
        .ask::<VerificationReply>(prompts.verification_prompt(&summary))
        .await
    {
        Ok(reply) => reply
            .verification_code
            .filter(|code| !code.trim().is_empty()),
        Err(e) => {
            warn!(error = %e, "Verification code generation failed; continuing without it");
            None
        }
    }
}
