//! Pre-execution cleanup of model-supplied snippets.
//!
//! Models sometimes interleave LaTeX or commentary with the code string.
//! These passes remove math-delimiter spans and comments before lexing.
//! Like the extraction heuristics they are text-level: a `//` or `$` inside
//! a string literal is removed too.

use regex::Regex;
use std::sync::LazyLock;

static DISPLAY_MATH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\$\$[\s\S]*?\$\$").ok());
static INLINE_MATH: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\$[^$]*?\$").ok());
static BLOCK_COMMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/\*[\s\S]*?\*/").ok());
static LINE_COMMENT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?m)//.*$").ok());

fn strip(pattern: &LazyLock<Option<Regex>>, text: String) -> String {
    match pattern.as_ref() {
        Some(regex) => regex.replace_all(&text, "").into_owned(),
        None => text,
    }
}

/// Removes `$$…$$`, `$…$`, `/* … */` and `// …` spans, in that order, and
/// trims the result.
pub fn clean_snippet(code: &str) -> String {
    let text = code.trim().to_string();
    let text = strip(&DISPLAY_MATH, text);
    let text = strip(&INLINE_MATH, text);
    let text = strip(&BLOCK_COMMENT, text);
    let text = strip(&LINE_COMMENT, text);
    text.trim().to_string()
}
