use thiserror::Error;

/// Errors raised while decoding tool-call markup.
///
/// None of these abort a parse: the region that triggered the error degrades
/// to plain text and the error is handed to the optional [`DiagnosticSink`].
#[derive(Debug, Clone, Error)]
pub enum ParserError {
    /// Tags could not be reconciled into a tree, even with recovery.
    #[error("structural parse failure: {0}")]
    Structural(String),

    /// A field's text could not be converted to its declared schema type.
    #[error("cannot coerce field `{path}` to {expected}: {message}")]
    Coercion {
        path: String,
        expected: &'static str,
        message: String,
    },

    /// A tag or call named a tool that was not supplied with the request.
    #[error("unknown tool reference: {0}")]
    UnknownTool(String),

    /// The JSON-embedded dialect's wrapped content is not valid JSON.
    #[error("malformed embedded payload: {0}")]
    MalformedPayload(String),

    /// Nesting exceeded the guard depth.
    #[error("maximum nesting depth {0} exceeded")]
    DepthExceeded(usize),
}

pub type ParserResult<T> = Result<T, ParserError>;

/// Observer for recovered parse failures.
///
/// Install one via `ParseOptions::on_error` to see what was degraded and why.
/// Parsing behaves identically whether or not a sink is present.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, error: &ParserError);
}
