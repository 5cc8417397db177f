//! Staged repair of near-JSON model output.
//!
//! Each stage is a pure function over `&str` so it can be tested on its own.
//! The stages run unconditionally and in order; already-valid JSON only pays
//! for a few string scans.
//!
//! # Limitations
//!
//! [`slice_outer_braces`] is a heuristic, not a tokenizer: it pairs the first
//! `{` with the last `}` in the text. Braces inside string values are fine as
//! long as the true outermost object is also the outermost brace pair, which
//! holds for well-formed model output. Prose that itself contains braces
//! after the JSON envelope will defeat it, and the parse then fails with a
//! [`ParseError`]. [`strip_trailing_commas`] likewise does not know about
//! string literals and will rewrite `", }"` inside a string.

use super::error::ParseError;
use log::debug;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::error::Category;
use std::borrow::Cow;
use std::sync::LazyLock;

static FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?\s*```$").ok());

static TRAILING_COMMA: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").ok());

/// Stage 2: strips a surrounding Markdown code fence (optionally tagged `json`).
///
/// Only a fence that wraps the entire text is removed.
pub fn strip_code_fence(text: &str) -> &str {
    if let Some(regex) = FENCE.as_ref()
        && let Some(captures) = regex.captures(text)
        && let Some(inner) = captures.get(1)
        && !inner.as_str().is_empty()
    {
        return inner.as_str().trim();
    }
    text
}

/// Stage 3: slices the text to the span between the first `{` and the last `}`.
///
/// Returns the input untouched when no such pair exists.
pub fn slice_outer_braces(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}

/// Stage 4: removes commas that directly precede a closing `}` or `]`.
pub fn strip_trailing_commas(text: &str) -> Cow<'_, str> {
    match TRAILING_COMMA.as_ref() {
        Some(regex) => regex.replace_all(text, "$1"),
        None => Cow::Borrowed(text),
    }
}

/// Runs every repair stage and returns the text that would be handed to the
/// JSON parser.
pub fn sanitize(raw: &str) -> String {
    let trimmed = raw.trim();
    let unfenced = strip_code_fence(trimmed);
    let sliced = slice_outer_braces(unfenced);
    strip_trailing_commas(sliced).into_owned()
}

/// Repairs `raw` and deserializes it into `T`.
///
/// Fails with [`ParseError`] when the repaired text is still not valid JSON
/// or does not match `T`. Partial data is never returned.
pub fn sanitize_and_parse<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    let processed = sanitize(raw);

    serde_json::from_str::<T>(&processed).map_err(|err| {
        debug!(
            "Could not parse model response: {}\nProcessed: {}\nOriginal: {}",
            err, processed, raw
        );
        match err.classify() {
            Category::Data => ParseError::UnexpectedShape {
                message: err.to_string(),
                raw: raw.to_string(),
            },
            Category::Io | Category::Syntax | Category::Eof => ParseError::Unrecoverable {
                message: err.to_string(),
                raw: raw.to_string(),
                processed,
            },
        }
    })
}
