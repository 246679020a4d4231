use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{DiagnosticSink, ParserError};

/// A tool made available to the model for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-schema object describing the tool's arguments.
    pub input_schema: Value,
}

impl Tool {
    pub fn new(name: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema,
        }
    }
}

/// Arguments attached to an outbound tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arguments {
    /// A pre-encoded JSON document.
    Json(String),
    /// A structured value, serialized on demand.
    Structured(Value),
}

impl Arguments {
    pub fn to_value(&self) -> Result<Value, ParserError> {
        match self {
            Arguments::Json(text) => serde_json::from_str(text)
                .map_err(|e| ParserError::MalformedPayload(e.to_string())),
            Arguments::Structured(value) => Ok(value.clone()),
        }
    }
}

/// A tool call to be rendered into model-facing markup.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Arguments,
}

/// A tool's result to be rendered back into the conversation.
#[derive(Debug, Clone)]
pub struct ToolResponse {
    pub tool_name: String,
    pub output: Value,
}

/// One segment of parsed generated text, before call ids are assigned.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPart {
    Text(String),
    ToolCall {
        name: String,
        /// JSON-encoded arguments object.
        arguments: String,
    },
}

/// One segment of middleware output, ids assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
}

/// Per-request knobs shared by every dialect.
#[derive(Clone, Default)]
pub struct ParseOptions {
    /// Override the JSON-embedded dialect's sentinel tag name.
    pub tool_call_tag: Option<String>,
    /// Observer for recovered parse failures.
    pub on_error: Option<Arc<dyn DiagnosticSink>>,
    /// Override the dialect's default for whether a coercion failure
    /// degrades the whole call to text.
    pub strict_arguments: Option<bool>,
}

impl ParseOptions {
    pub(crate) fn report(&self, error: &ParserError) {
        if let Some(sink) = &self.on_error {
            sink.report(error);
        }
    }
}
