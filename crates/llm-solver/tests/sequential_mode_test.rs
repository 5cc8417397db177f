mod common;

use common::*;
use llm_solver::agent::AgentError;
use llm_solver::progress::Phase;
use llm_solver::{ExecValue, Mode, SolveError, SolveRequest, Solver};

fn advanced() -> SolveRequest {
    SolveRequest::new(COIN_TOSS_PROBLEM).with_mode(Mode::Advanced)
}

#[tokio::test]
async fn test_final_step_result_is_the_answer() {
    let solver = solver(ScriptedAgent::new(|call, index, _| {
        Ok(match (call, index) {
            (Call::Understanding, _) => fenced(&understanding_json()),
            (Call::Step, 0) => step_json(
                "Model the tosses as $X \\sim \\mathrm{Bin}(10, 0.5)$.",
                None,
                false,
                Some("Sum the upper tail."),
            )
            .to_string(),
            (Call::Step, _) => with_prose(&step_json(
                "The tail probability is $176/1024$.",
                Some(COIN_TOSS_CODE),
                true,
                None,
            )),
            (call, _) => unreachable!("unexpected {call:?} call"),
        })
    }));

    let result = solver.solve(advanced()).await.unwrap();

    assert_eq!(result.mode(), Mode::Advanced);
    assert!(result.standard_solution().is_none());
    let solution = result.sequential_solution().unwrap();
    assert_eq!(solution.steps.len(), 2);
    assert!(!solution.halted);
    assert_eq!(solution.final_computed_answer, Some(ExecValue::Number(0.171875)));
    assert_eq!(solution.final_summary_text, "The tail probability is $176/1024$.");
    assert_eq!(solution.steps[0].step_js_code, None);
    assert_eq!(solution.steps[0].step_js_code_result, None);
    assert_eq!(solver.agent().calls_of(Call::Solution), 0);
    assert_eq!(solver.agent().calls_of(Call::Verification), 0);
}

#[tokio::test]
async fn test_never_final_halts_at_the_cap() {
    let solver = solver(ScriptedAgent::new(|call, index, _| {
        Ok(match call {
            Call::Understanding => understanding_json().to_string(),
            _ => step_json(&format!("Still thinking ({index})"), None, false, Some("Keep going.")).to_string(),
        })
    }));

    let result = solver.solve(advanced()).await.unwrap();
    let solution = result.sequential_solution().unwrap();

    assert_eq!(solver.agent().calls_of(Call::Step), 10);
    assert_eq!(solver.agent().calls(), 11);
    assert_eq!(solution.steps.len(), 11);
    assert!(solution.halted);
    assert_eq!(solution.final_computed_answer, None);

    let note = &solution.steps[10].step_explanation;
    assert!(note.contains("exceeded maximum sequential steps (10)"));
    assert!(note.contains("Current focus was: \"Keep going.\""));
    assert_eq!(&solution.final_summary_text, note);
}

#[tokio::test]
async fn test_step_cap_is_configurable() {
    let agent = ScriptedAgent::new(|call, _, _| {
        Ok(match call {
            Call::Understanding => understanding_json().to_string(),
            _ => step_json("More", None, false, None).to_string(),
        })
    });
    let solver = Solver::new(agent, config().with_max_sequential_steps(3));

    let result = solver.solve(advanced()).await.unwrap();
    let solution = result.sequential_solution().unwrap();

    assert_eq!(solver.agent().calls_of(Call::Step), 3);
    assert_eq!(solution.steps.len(), 4);
    assert!(solution.steps[3].step_explanation.contains("(3)"));
}

#[tokio::test]
async fn test_code_error_is_recorded_and_the_loop_continues() {
    let solver = solver(ScriptedAgent::new(|call, index, _| {
        Ok(match (call, index) {
            (Call::Understanding, _) => understanding_json().to_string(),
            (Call::Step, 0) => step_json(
                "Try a helper that does not exist.",
                Some("return binomialTail(10, 7);"),
                false,
                Some("Compute the tail directly."),
            )
            .to_string(),
            (Call::Step, _) => step_json(
                "Direct computation.",
                Some("return (120 + 45 + 10 + 1) / 1024;"),
                true,
                None,
            )
            .to_string(),
            (call, _) => unreachable!("unexpected {call:?} call"),
        })
    }));

    let result = solver.solve(advanced()).await.unwrap();
    let solution = result.sequential_solution().unwrap();

    let failed = &solution.steps[0];
    assert_eq!(failed.step_js_code_result, None);
    assert!(failed.step_js_code_error.as_deref().unwrap().contains("binomialTail"));

    assert_eq!(solution.steps.len(), 2);
    assert_eq!(solution.final_computed_answer, Some(ExecValue::Number(0.171875)));
}

#[tokio::test]
async fn test_history_is_replayed_in_later_prompts() {
    let solver = solver(ScriptedAgent::new(|call, index, _| {
        Ok(match (call, index) {
            (Call::Understanding, _) => understanding_json().to_string(),
            (Call::Step, 0) => step_json(
                "Count the favourable outcomes.",
                Some("return 120 + 45 + 10 + 1;"),
                false,
                Some("Divide by the number of outcomes."),
            )
            .to_string(),
            (Call::Step, _) => step_json("Done.", None, true, None).to_string(),
            (call, _) => unreachable!("unexpected {call:?} call"),
        })
    }));

    solver.solve(advanced()).await.unwrap();

    let prompts = solver.agent().prompts();
    let first = &prompts[1];
    let second = &prompts[2];

    assert!(first.contains("No previous steps taken."));
    assert!(first.contains("Current Focus for THIS Step: \"Compute the probability of at least 7 heads\""));

    assert!(!second.contains("No previous steps taken."));
    assert!(second.contains("Step 1:"));
    assert!(second.contains("Count the favourable outcomes."));
    assert!(second.contains("return 120 + 45 + 10 + 1;"));
    assert!(second.contains("JS Result:"));
    assert!(second.contains("176"));
    assert!(second.contains("Current Focus for THIS Step: \"Divide by the number of outcomes.\""));
}

#[tokio::test]
async fn test_missing_next_focus_falls_back() {
    let (reporter, events) = recorder();
    let solver = solver(ScriptedAgent::new(|call, index, _| {
        Ok(match (call, index) {
            (Call::Understanding, _) => understanding_json().to_string(),
            (Call::Step, 0) => step_json("First look.", None, false, None).to_string(),
            (Call::Step, _) => step_json("Wrap up.", None, true, None).to_string(),
            (call, _) => unreachable!("unexpected {call:?} call"),
        })
    }))
    .with_reporter(reporter);

    solver.solve(advanced()).await.unwrap();

    let events = events.lock().unwrap().clone();
    let steps: Vec<_> = events
        .iter()
        .flatten()
        .filter(|e| e.phase == Phase::SequentialSolving)
        .collect();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].current_step, 1);
    assert_eq!(steps[1].current_step, 2);
    assert_eq!(
        steps[1].step_description,
        "Thinking about: \"Summarize findings and conclude.\""
    );
    assert_eq!(events.first().unwrap().as_ref().unwrap().phase, Phase::UnderstandingProblem);
    assert_eq!(events.last(), Some(&None));
}

#[tokio::test]
async fn test_unparseable_step_ends_the_loop_without_retry() {
    let solver = solver(ScriptedAgent::new(|call, index, _| {
        Ok(match (call, index) {
            (Call::Understanding, _) => understanding_json().to_string(),
            (Call::Step, 0) => step_json("Set up.", None, false, Some("Compute.")).to_string(),
            (Call::Step, _) => "Let me think about that some more...".to_string(),
            (call, _) => unreachable!("unexpected {call:?} call"),
        })
    }));

    let result = solver.solve(advanced()).await.unwrap();
    let solution = result.sequential_solution().unwrap();

    assert_eq!(solver.agent().calls_of(Call::Understanding), 1);
    assert_eq!(solver.agent().calls_of(Call::Step), 2);
    assert_eq!(solution.steps.len(), 2);
    assert!(!solution.halted);
    assert!(
        solution.steps[1]
            .step_explanation
            .starts_with("**Error processing AI response for sequential step (focus: \"Compute.\"):**")
    );
    assert_eq!(solution.final_summary_text, solution.steps[1].step_explanation);
}

#[tokio::test]
async fn test_step_api_error_becomes_an_entry() {
    let solver = solver(ScriptedAgent::new(|call, _, _| match call {
        Call::Understanding => Ok(understanding_json().to_string()),
        _ => Err(AgentError::ProcessError("connection reset".to_string())),
    }));

    let result = solver.solve(advanced()).await.unwrap();
    let solution = result.sequential_solution().unwrap();

    assert_eq!(solution.steps.len(), 1);
    assert!(solution.steps[0].step_explanation.contains("connection reset"));
    assert_eq!(solution.final_computed_answer, None);
}

#[tokio::test]
async fn test_blank_step_code_is_not_executed() {
    let solver = solver(ScriptedAgent::new(|call, _, _| {
        Ok(match call {
            Call::Understanding => understanding_json().to_string(),
            _ => step_json("Only prose here.", Some("// just a comment"), true, None).to_string(),
        })
    }));

    let result = solver.solve(advanced()).await.unwrap();
    let step = &result.sequential_solution().unwrap().steps[0];

    assert_eq!(step.step_js_code.as_deref(), Some("// just a comment"));
    assert_eq!(step.step_js_code_result, None);
    assert_eq!(step.step_js_code_error, None);
}

#[tokio::test]
async fn test_advanced_image_note() {
    let solver = solver(ScriptedAgent::new(|call, _, _| {
        Ok(match call {
            Call::Understanding => understanding_json().to_string(),
            _ => step_json("Read the figure.", None, true, None).to_string(),
        })
    }));
    let image = llm_solver::ImageData::new("image/jpeg", vec![0xff, 0xd8, 0xff]);

    solver.solve(advanced().with_image(image)).await.unwrap();

    let step_prompt = &solver.agent().prompts()[1];
    assert!(step_prompt.contains("attached to the original problem"));
}

#[tokio::test]
async fn test_understanding_failure_names_the_mode() {
    let solver = solver(ScriptedAgent::new(|_, _, _| {
        Err(AgentError::ExecutionFailed("quota exceeded".to_string()))
    }));

    let err = solver.solve(advanced()).await.unwrap_err();

    assert!(matches!(err, SolveError::AdvancedUnderstanding(_)));
    assert!(
        err.to_string()
            .starts_with("Error understanding problem (Advanced): ")
    );
    assert!(err.to_string().contains("quota exceeded"));
    assert_eq!(solver.agent().calls(), 1);
}
