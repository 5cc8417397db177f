use llm_solver::sandbox::{
    CodeSandbox, ExecValue, Execution, ExecutionContext, NO_EXECUTABLE_CODE, SandboxConfig,
    display_execution,
};
use std::time::{Duration, Instant};

#[test]
fn test_verification_snippet_with_markup() {
    let code = r#"
        $$P(X \geq 7) = \sum_{k=7}^{10} \binom{10}{k} 2^{-10}$$
        /* Pascal row 10 */
        const row = [1, 10, 45, 120, 210, 252, 210, 120, 45, 10, 1];
        const favourable = row.slice(7).reduce((a, b) => a + b, 0); // 176
        return favourable / 1024;
    "#;

    let execution = CodeSandbox::new().execute(code);

    assert_eq!(execution, Execution::success(Some(ExecValue::Number(0.171875))));
}

#[test]
fn test_structured_results_render_as_json() {
    let execution = CodeSandbox::new().execute("return { heads: 7, p: 0.5, tosses: [1, 2] };");

    assert_eq!(
        display_execution(&execution, ExecutionContext::Step),
        "{\n  \"heads\": 7,\n  \"p\": 0.5,\n  \"tosses\": [\n    1,\n    2\n  ]\n}"
    );
}

#[test]
fn test_errors_never_escape() {
    let sandbox = CodeSandbox::new();
    for code in [
        "return undefinedThing + 1;",
        "return null.length;",
        "throw 'plain string';",
        "return ((;",
        "const x = 1; x = 2;",
    ] {
        let execution = sandbox.execute(code);
        assert!(execution.is_error(), "expected an error for {code}");
        assert_eq!(execution.result, None);
    }
}

#[test]
fn test_step_context_undefined_message() {
    let execution = CodeSandbox::new().execute("const p = 176 / 1024;");
    assert!(!execution.is_error());
    assert_eq!(
        display_execution(&execution, ExecutionContext::Step),
        "undefined (This step's code might not return an explicit value.)"
    );
}

#[test]
fn test_comment_only_snippet() {
    let execution = CodeSandbox::new().execute("/* the model only explained itself */");
    assert_eq!(execution.result.as_ref().and_then(ExecValue::as_str), Some(NO_EXECUTABLE_CODE));
}

#[test]
fn test_runaway_snippet_is_stopped_quickly() {
    let sandbox = CodeSandbox::with_config(
        SandboxConfig::default()
            .with_step_budget(u64::MAX)
            .with_timeout(Duration::from_millis(50)),
    );

    let started = Instant::now();
    let execution = sandbox.execute("let x = 0; while (true) { x = x + 1; }");

    assert!(execution.is_error());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_executions_do_not_share_state() {
    let sandbox = CodeSandbox::new();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let sandbox = sandbox.clone();
            std::thread::spawn(move || {
                sandbox.execute(&format!(
                    "if (typeof counter === 'undefined') {{ var counter = 0; }} counter += {i}; return counter;"
                ))
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let execution = handle.join().unwrap();
        assert_eq!(execution.result, Some(ExecValue::Number(i as f64)));
    }
}

#[test]
fn test_monte_carlo_simulation_fits_the_default_budget() {
    let code = r#"
        const trials = 10000;
        let hits = 0;
        for (let t = 0; t < trials; t++) {
          let heads = 0;
          for (let i = 0; i < 10; i++) {
            if (Math.random() < 0.5) heads++;
          }
          if (heads >= 7) hits++;
        }
        return hits / trials;
    "#;
    // A generous clock keeps slow debug builds from timing out first.
    let sandbox = CodeSandbox::with_config(SandboxConfig::default().with_timeout(Duration::from_secs(30)));

    let execution = sandbox.execute(code);

    assert_eq!(execution.error, None);
    let p = execution.result.as_ref().and_then(ExecValue::as_f64).unwrap();
    assert!((0.12..=0.23).contains(&p), "estimate {p} far from 176/1024");
}

#[test]
fn test_dynamic_programming_table() {
    let code = r#"
        const n = 10;
        const ways = new Array(n + 1).fill(0);
        ways[0] = 1;
        for (let toss = 0; toss < n; toss++) {
          for (let k = toss + 1; k > 0; k--) ways[k] += ways[k - 1];
        }
        let favourable = 0;
        for (let k = 7; k <= n; k++) favourable += ways[k];
        return favourable / (1 << n);
    "#;

    let execution = CodeSandbox::new().execute(code);

    assert_eq!(execution, Execution::success(Some(ExecValue::Number(176.0 / 1024.0))));
}

#[test]
fn test_string_blow_up_is_contained() {
    let sandbox = CodeSandbox::with_config(SandboxConfig::default().with_max_string_length(1 << 16));

    let execution = sandbox.execute("let s = 'ab'; while (true) { s = s + s; }");
    assert_eq!(execution.error.as_deref(), Some("Invalid string length"));

    let execution = sandbox.execute(
        "try { let s = 'ab'; while (true) s = s.concat(s); } catch (e) { return e.name; }",
    );
    assert_eq!(execution.result.as_ref().and_then(ExecValue::as_str), Some("RangeError"));
}

#[test]
fn test_long_prefix_update_chain_is_an_error() {
    let code = format!("let a = 1; return {}a;", "++".repeat(20_000));

    let execution = CodeSandbox::new().execute(&code);

    assert_eq!(execution.error.as_deref(), Some("Maximum nesting depth exceeded"));
}
