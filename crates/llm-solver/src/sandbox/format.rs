//! Human-readable rendering of snippet executions.

use super::Execution;
use super::value::{ExecValue, number_to_string};

/// Where an execution came from; only changes the wording for `undefined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// The standard-mode verification snippet.
    Verification,
    /// A code snippet attached to a sequential step.
    Step,
}

const UNDEFINED_VERIFICATION: &str = "undefined (AI's verification code might not return an explicit value, or it's a block of non-returning statements. It should use 'return ...;')";
const UNDEFINED_STEP: &str = "undefined (This step's code might not return an explicit value.)";

/// Renders an execution for display.
///
/// - errors become `Error: <message>`
/// - integers print plainly, other finite numbers with at most 10 decimals
/// - arrays and objects print as indented JSON with `[Function]` placeholders
/// - a missing result (`undefined`) becomes a diagnostic
///
/// ```
/// use llm_solver::sandbox::{CodeSandbox, ExecutionContext, display_execution};
///
/// let execution = CodeSandbox::new().execute("return 1 / 3;");
/// assert_eq!(display_execution(&execution, ExecutionContext::Step), "0.3333333333");
/// ```
pub fn display_execution(execution: &Execution, context: ExecutionContext) -> String {
    if let Some(error) = &execution.error {
        return format!("Error: {error}");
    }
    match &execution.result {
        Some(value) => display_value(value),
        None => match context {
            ExecutionContext::Verification => UNDEFINED_VERIFICATION.to_string(),
            ExecutionContext::Step => UNDEFINED_STEP.to_string(),
        },
    }
}

/// Renders a single result value.
pub fn display_value(value: &ExecValue) -> String {
    match value {
        ExecValue::Number(n) => format_number(*n),
        ExecValue::Array(_) | ExecValue::Object(_) => value.to_json_pretty(),
        other => other.to_string(),
    }
}

/// Integers as-is; other finite numbers fixed to 10 places with trailing zeros
/// trimmed. A tiny negative value keeps its sign (`-0`).
pub fn format_number(n: f64) -> String {
    if !n.is_finite() || n.fract() == 0.0 {
        return number_to_string(n);
    }
    let fixed = super::value::to_fixed(n, 10);
    if !fixed.contains('.') {
        return fixed;
    }
    let trimmed = fixed.trim_end_matches('0');
    trimmed.strip_suffix('.').unwrap_or(trimmed).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(value: ExecValue) -> Execution {
        Execution {
            result: Some(value),
            error: None,
        }
    }

    #[test]
    fn test_numbers() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(0.171875), "0.171875");
        assert_eq!(format_number(2.0 / 3.0), "0.6666666667");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(1e-12), "0");
        assert_eq!(format_number(-1e-12), "-0");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(-2.5), "-2.5");
    }

    #[test]
    fn test_error_wins() {
        let execution = Execution {
            result: None,
            error: Some("boom".to_string()),
        };
        assert_eq!(
            display_execution(&execution, ExecutionContext::Verification),
            "Error: boom"
        );
    }

    #[test]
    fn test_undefined_diagnostics_depend_on_context() {
        let execution = Execution::default();
        assert!(
            display_execution(&execution, ExecutionContext::Verification)
                .contains("It should use 'return ...;'")
        );
        assert_eq!(
            display_execution(&execution, ExecutionContext::Step),
            "undefined (This step's code might not return an explicit value.)"
        );
    }

    #[test]
    fn test_objects_render_as_pretty_json() {
        let execution = ok(ExecValue::Object(vec![
            ("p".to_string(), ExecValue::Number(0.5)),
            ("f".to_string(), ExecValue::Function("g".to_string())),
        ]));
        assert_eq!(
            display_execution(&execution, ExecutionContext::Step),
            "{\n  \"p\": 0.5,\n  \"f\": \"[Function]\"\n}"
        );
    }

    #[test]
    fn test_scalars() {
        assert_eq!(display_value(&ExecValue::Null), "null");
        assert_eq!(display_value(&ExecValue::Bool(false)), "false");
        assert_eq!(display_value(&ExecValue::String("hi".to_string())), "hi");
    }
}
