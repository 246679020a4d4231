//! Tool-call middleware for LLM serving.
//!
//! Extracts structured tool calls from the tag-delimited or JSON-embedded
//! markup models emit, whole-text or incrementally over a live token stream,
//! and renders calls and results back into the wire dialect the model was
//! prompted with.
//!
//! The layers, bottom up:
//! - [`tag_parser`]: chunk-safe tag scanning, tree assembly with optional
//!   recovery, lazy stream queries, and schema-guided argument coercion;
//! - [`protocol`]: the [`ToolCallFormat`](protocol::ToolCallFormat) trait,
//!   the built-in dialects, and a registry to pick one by name;
//! - [`middleware`]: the orchestrating front door for whole texts and
//!   delta streams.
//!
//! Parsing is deliberately non-fatal end to end. Markup that cannot be
//! decoded comes back as plain text, and an optional
//! [`DiagnosticSink`](errors::DiagnosticSink) observes what was degraded.

pub mod errors;
pub mod middleware;
pub mod protocol;
pub mod tag_parser;

pub use errors::{DiagnosticSink, ParserError, ParserResult};
pub use middleware::{
    CallIdGenerator, SequentialCallIds, StreamState, ToolCallMiddleware, UuidCallIds,
};
pub use protocol::{
    Arguments, ContentPart, FormatFactory, FormatRegistry, JsonCallFormat, MorphTagFormat,
    ParseOptions, ParsedPart, StrictTagFormat, Tool, ToolCallFormat, ToolCallRequest, ToolResponse,
};
