//! Prompt construction for every model call.
//!
//! Templates are rendered with `minijinja`. Problem text and earlier model
//! output only ever enter a template as variables, so braces inside them are
//! never interpreted.

use crate::subject::SubjectConfig;
use crate::types::{Mode, ProblemUnderstanding, SequentialStepOutput, SolutionStep};
use minijinja::{Environment, context};
use serde::Serialize;

/// Shared rules for JSON envelopes, Markdown and LaTeX inside JSON strings.
pub const FORMAT_RULES: &str = r#"OUTPUT FORMAT - JSON, MARKDOWN AND LATEX:
1. Your whole reply must be one valid JSON object. Nothing may come before the opening `{` or after the closing `}`: no prose, no code fences, no comments.
2. Text fields (explanations, answers, restatements) are GitHub Flavored Markdown: lists, **bold**, *italics*, `inline code` and fenced code blocks are all fine.
3. Mathematics uses KaTeX syntax: `$...$` inline and `$$...$$` for display formulas.
4. Inside JSON strings a newline is written as the two characters `\n`, and every LaTeX backslash is doubled, so `\frac{a}{b}` is written as `\\frac{a}{b}`.
5. No trailing commas in objects or arrays.
6. Keep inline formulas on the line they belong to; do not break a line right after inline math unless a new paragraph starts.
7. State every number and formula exactly once. Re-read your answer for accidental repetitions such as "0.1230.123" before replying.
8. For long formulas you may introduce short variable names such as $P_F$, defined next to their first use."#;

/// Image note used when the problem comes with an image.
pub fn image_note(mode: Mode, has_image: bool) -> &'static str {
    match (has_image, mode) {
        (false, _) => "",
        (true, Mode::Standard) => "(Note: An image is attached. Consider its content.)",
        (true, Mode::Advanced) => {
            "(Note: An image is attached to the original problem. Consider its content.)"
        }
    }
}

/// Values shared by every prompt of one solve.
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext<'a> {
    pub problem: &'a str,
    pub image_note: &'a str,
    pub subject: &'static SubjectConfig,
    /// Output of [`format_understanding`]; empty before the first phase.
    pub understanding: &'a str,
}

const UNDERSTANDING_TEMPLATE: &str = r#"
You are a meticulous assistant specializing in {{ ctx.subject.name }}. {{ ctx.subject.system_context }}

Your first and most important task is to show that you fully understand the problem below.

Problem Description:
"{{ ctx.problem }}"
{{ ctx.image_note }}

Instructions:
1. Restate the problem in your own words, clearly and completely, in Markdown. This field is mandatory.
2. List the key information. {{ ctx.subject.problem_analysis_instructions }} Use one Markdown string per item.
3. State the goal: what must be calculated, determined or found.
4. Acknowledge the image: if one was provided, say briefly what it shows and why it matters; otherwise write "No image was provided."

{{ format_rules }}

Reply with a JSON object of exactly this shape:
{
  "restatedProblem": "Markdown restatement of the problem.",
  "keyInformation": ["First key fact, e.g. $n = 10$.", "Second key fact."],
  "problemGoal": "Markdown statement of what must be found.",
  "imageAcknowledgement": "Markdown statement about the image, or that none was provided."
}
"#;

const SOLUTION_TEMPLATE: &str = r#"
You are an expert in {{ ctx.subject.name }}. {{ ctx.subject.system_context }} Your task is a detailed, step-by-step textual solution.
{% if ctx.understanding %}

FIRST, REVIEW THE INITIAL PROBLEM ANALYSIS:
{{ ctx.understanding }}
---
{% endif %}

Main Task:
For the following problem, provide a detailed step-by-step textual solution in English, using GitHub Flavored Markdown for all explanations.
Problem: {{ ctx.problem }}
{{ ctx.image_note }}

Solution Approach: {{ ctx.subject.solution_approach }}

{{ format_rules }}

Reply with a JSON object of exactly this shape:
{
  "solutionSteps": [
    { "explanation": "Markdown explanation of step 1." },
    { "explanation": "Markdown explanation of step 2." }
  ],
  "finalAnswer": "The final answer in Markdown, derived from the steps."
}
"#;

const VERIFICATION_TEMPLATE: &str = r#"
You are an expert JavaScript programmer with deep knowledge of {{ ctx.subject.name }}. {{ ctx.subject.system_context }} Your task is to write code that verifies a textual solution.
{% if ctx.understanding %}

REVIEW THE INITIAL PROBLEM UNDERSTANDING:
{{ ctx.understanding }}
---
{% endif %}

The original problem was:
"{{ ctx.problem }}"
{{ ctx.image_note }}

The complete textual solution was:
"{{ solution }}"

Write one self-contained block of JavaScript that solves the original problem computationally.

Code Requirements: {{ ctx.subject.verification_code_instructions }}

JSON AND CODE FORMAT:
1. Reply with one valid JSON object and nothing else.
2. The code is a single string under the "verificationCode" key.
3. The code must end with an explicit `return <expression>;` producing the result.
4. Use only plain JavaScript and the standard `Math`, `Number`, `Array`, `JSON` globals; no imports, no DOM, no network.
5. No trailing commas.

Reply shape: { "verificationCode": "const n = 10; let p = 0; /* ... */ return p;" }
"#;

const SEQUENTIAL_STEP_TEMPLATE: &str = r#"
You are solving a {{ ctx.subject.name }} problem one step at a time. {{ ctx.subject.system_context }}
Each call gives you the original problem, your initial understanding, every step taken so far and the focus for this step.

1. Original Problem: "{{ ctx.problem }}"
   {{ ctx.image_note }}

2. Initial Understanding of the Problem (Markdown):
{{ ctx.understanding }}

3. History of Previous Steps:
{% for step in history %}
{% if not loop.first %}
---
{% endif %}
Step {{ loop.index }}:
Explanation (Markdown): {{ step.explanation }}
{% if step.code %}
JS Code: {{ step.code }}
{% endif %}
{% if step.result is not none %}
JS Result: {{ step.result }}
{% endif %}
{% if step.error %}
JS Error: {{ step.error }}
{% endif %}
{% else %}
No previous steps taken. This is the first reasoning/calculation step after initial understanding.
{% endfor %}

4. Current Focus for THIS Step: "{{ focus }}"

Perform the reasoning or calculation the current focus asks for.

Solution Approach: {{ ctx.subject.solution_approach }}

{{ format_rules }}

Reply with a JSON object of exactly this shape:
{
  "stepExplanation": "Markdown explanation of this step. On the final step it must state the overall final answer.",
  "stepJsCode": "Optional short JavaScript for this step's calculation, ending in `return <value>;`. Omit it or leave it empty when no calculation is needed.",
  "isThisTheFinalStep": false,
  "focusForNextStep": "Plain-text objective of the next step; empty on the final step."
}
The result of "stepJsCode" on the final step is taken as the final computed answer.
"#;

#[derive(Serialize)]
struct HistoryEntry<'a> {
    explanation: &'a str,
    code: Option<&'a str>,
    result: Option<String>,
    error: Option<&'a str>,
}

fn render<S: Serialize>(template: &str, ctx: S) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("prompt", template)?;
    let tmpl = env.get_template("prompt")?;
    tmpl.render(ctx)
}

impl PromptContext<'_> {
    pub fn understanding_prompt(&self) -> Result<String, minijinja::Error> {
        render(
            UNDERSTANDING_TEMPLATE,
            context! { ctx => self, format_rules => FORMAT_RULES },
        )
    }

    pub fn solution_prompt(&self) -> Result<String, minijinja::Error> {
        render(
            SOLUTION_TEMPLATE,
            context! { ctx => self, format_rules => FORMAT_RULES },
        )
    }

    /// `solution` is the output of [`summarize_solution`].
    pub fn verification_prompt(&self, solution: &str) -> Result<String, minijinja::Error> {
        render(VERIFICATION_TEMPLATE, context! { ctx => self, solution => solution })
    }

    /// Replays the whole history so every iteration sees the accumulated context.
    pub fn sequential_step_prompt(
        &self,
        history: &[SequentialStepOutput],
        focus: &str,
    ) -> Result<String, minijinja::Error> {
        let history: Vec<HistoryEntry<'_>> = history
            .iter()
            .map(|step| HistoryEntry {
                explanation: &step.step_explanation,
                code: step.step_js_code.as_deref().filter(|c| !c.trim().is_empty()),
                result: step.step_js_code_result.as_ref().map(|v| v.to_string()),
                error: step.step_js_code_error.as_deref(),
            })
            .collect();
        render(
            SEQUENTIAL_STEP_TEMPLATE,
            context! { ctx => self, history => history, focus => focus, format_rules => FORMAT_RULES },
        )
    }
}

/// Renders the understanding as the labelled context block later prompts replay.
pub fn format_understanding(understanding: &ProblemUnderstanding) -> String {
    let key_information = understanding
        .key_information
        .iter()
        .map(|info| format!("- {info}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "AI's Problem Analysis (Markdown):\n- Restated Problem:\n{}\n- Key Information:\n{}\n- Goal:\n{}\n- Image:\n{}",
        understanding.restated_problem,
        key_information,
        understanding.problem_goal,
        understanding.image_acknowledgement
    )
}

/// Joins step explanations and appends the final answer, for the verification prompt.
pub fn summarize_solution(steps: &[SolutionStep], final_answer: &str) -> String {
    let explanations = steps
        .iter()
        .map(|s| s.explanation.as_str())
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    format!("{explanations}\n\n**Final Answer (Textual - Markdown):**\n{final_answer}")
}
