//! Recovery of structured data from chat-style model output.
//!
//! Models reliably produce JSON but not reliably *only* JSON: Markdown
//! fences, leading prose and trailing commas are common. The
//! [`sanitizer`] stages each target one of those failure modes.
//!
//! # Examples
//!
//! ```rust
//! use llm_solver::extract::sanitize_and_parse;
//! use serde_json::Value;
//!
//! let value: Value = sanitize_and_parse("Here you go: {\"a\": 1,} Enjoy!").unwrap();
//! assert_eq!(value["a"], 1);
//! ```

pub mod error;
pub mod sanitizer;

pub use self::error::{PARSE_ERROR_MARKER, ParseError};
pub use self::sanitizer::{
    sanitize, sanitize_and_parse, slice_outer_braces, strip_code_fence, strip_trailing_commas,
};
