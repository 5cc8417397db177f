/// Marker carried at the start of every [`ParseError`] message.
///
/// Callers that only see the rendered message (for example a UI layer) can
/// still recognise a parse failure by looking for this prefix.
pub const PARSE_ERROR_MARKER: &str = "Could not parse response from AI";

/// Response parsing errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    /// No valid JSON object could be recovered after every repair stage ran.
    #[error("Could not parse response from AI. Invalid JSON format. Error details: {message}")]
    Unrecoverable {
        /// The parser's own message.
        message: String,
        /// The text exactly as the model returned it.
        raw: String,
        /// The text that was finally handed to the JSON parser.
        processed: String,
    },

    /// The JSON parsed but did not match the expected shape.
    #[error("Could not parse response from AI. Unexpected structure. Error details: {message}")]
    UnexpectedShape {
        message: String,
        raw: String,
    },
}

impl ParseError {
    /// The raw model output that failed to parse.
    pub fn raw(&self) -> &str {
        match self {
            ParseError::Unrecoverable { raw, .. } | ParseError::UnexpectedShape { raw, .. } => raw,
        }
    }

    /// Returns true if `message` looks like a rendered `ParseError`.
    pub fn is_parse_message(message: &str) -> bool {
        message.contains(PARSE_ERROR_MARKER)
    }
}
