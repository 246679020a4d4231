use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::errors::{ParserError, ParserResult};
use crate::protocol::formats::helpers::{get_tool_indices, push_text, restrict_to_schema};
use crate::protocol::traits::ToolCallFormat;
use crate::protocol::types::{ParseOptions, ParsedPart, Tool, ToolCallRequest, ToolResponse};

/// JSON-embedded dialect.
///
/// Calls are JSON objects wrapped in a sentinel tag pair:
/// `<tool_call>{"name": "...", "arguments": {...}}</tool_call>`. The tag
/// name is configurable per request. A wrapped payload that is not valid
/// JSON, or names an unknown tool, passes through as text with its tags.
#[derive(Debug, Default)]
pub struct JsonCallFormat;

pub const DEFAULT_CALL_TAG: &str = "tool_call";

static DEFAULT_EXTRACTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<tool_call>\s*(.*?)\s*</tool_call>").expect("static pattern")
});

fn call_tag(options: &ParseOptions) -> &str {
    options.tool_call_tag.as_deref().unwrap_or(DEFAULT_CALL_TAG)
}

fn extractor_for(tag: &str) -> std::borrow::Cow<'static, Regex> {
    if tag == DEFAULT_CALL_TAG {
        std::borrow::Cow::Borrowed(&*DEFAULT_EXTRACTOR)
    } else {
        let pattern = format!(
            r"(?s)<{tag}>\s*(.*?)\s*</{tag}>",
            tag = regex::escape(tag)
        );
        std::borrow::Cow::Owned(Regex::new(&pattern).expect("escaped pattern"))
    }
}

/// Decode one wrapped payload into (tool name, JSON-encoded arguments).
fn parse_embedded_call(payload: &str, tools: &[Tool]) -> ParserResult<(String, String)> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| ParserError::MalformedPayload(e.to_string()))?;
    let name = value
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| ParserError::MalformedPayload("missing \"name\" field".to_string()))?
        .to_string();

    let indices = get_tool_indices(tools);
    let Some(&index) = indices.get(&name) else {
        return Err(ParserError::UnknownTool(name));
    };

    // Either key works; some models double-encode the object as a string.
    let raw_arguments = value
        .get("arguments")
        .or_else(|| value.get("parameters"))
        .cloned()
        .unwrap_or(Value::Object(serde_json::Map::new()));
    let mut arguments = match raw_arguments {
        Value::String(inner) => serde_json::from_str(&inner)
            .map_err(|e| ParserError::MalformedPayload(e.to_string()))?,
        other => other,
    };
    restrict_to_schema(&mut arguments, &tools[index].input_schema);

    Ok((
        name,
        serde_json::to_string(&arguments).unwrap_or_default(),
    ))
}

#[async_trait]
impl ToolCallFormat for JsonCallFormat {
    fn format_tool_call(&self, request: &ToolCallRequest) -> ParserResult<String> {
        let arguments = request.arguments.to_value()?;
        let body = serde_json::json!({
            "name": request.name,
            "arguments": arguments,
        });
        Ok(format!(
            "<{tag}>{}</{tag}>",
            serde_json::to_string(&body).unwrap_or_default(),
            tag = DEFAULT_CALL_TAG
        ))
    }

    fn format_tool_response(&self, response: &ToolResponse) -> ParserResult<String> {
        let body = serde_json::json!({
            "name": response.tool_name,
            "content": response.output,
        });
        Ok(format!(
            "<tool_response>{}</tool_response>",
            serde_json::to_string(&body).unwrap_or_default()
        ))
    }

    fn format_system_prompt(&self, tools: &[Tool], options: &ParseOptions) -> String {
        let tag = call_tag(options);
        let mut prompt = format!(
            "You may call tools. To call one, emit a JSON object wrapped in \
             <{tag}> tags:\n<{tag}>{{\"name\": \"tool_name\", \"arguments\": \
             {{...}}}}</{tag}>\n\nAvailable tools:\n",
            tag = tag
        );
        for tool in tools {
            prompt.push_str(&format!(
                "- {}: {}\n  schema: {}\n",
                tool.name,
                tool.description.as_deref().unwrap_or(""),
                serde_json::to_string(&tool.input_schema).unwrap_or_default(),
            ));
        }
        prompt
    }

    async fn parse_generated_text(
        &self,
        text: &str,
        tools: &[Tool],
        options: &ParseOptions,
    ) -> Vec<ParsedPart> {
        let extractor = extractor_for(call_tag(options));
        let mut parts = Vec::new();
        let mut pos = 0usize;
        for captures in extractor.captures_iter(text) {
            let whole = captures.get(0).map(|m| m.range()).unwrap_or(0..0);
            let payload = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            push_text(&mut parts, &text[pos..whole.start]);
            pos = whole.end;

            match parse_embedded_call(payload, tools) {
                Ok((name, arguments)) => parts.push(ParsedPart::ToolCall { name, arguments }),
                Err(error) => {
                    warn!(%error, "undecodable embedded call, passing through");
                    // An unknown tool name is plain text, not a failure.
                    if !matches!(error, ParserError::UnknownTool(_)) {
                        options.report(&error);
                    }
                    // Tags included, so nothing is silently swallowed.
                    push_text(&mut parts, &text[whole]);
                }
            }
        }
        push_text(&mut parts, &text[pos..]);

        if parts.is_empty() {
            parts.push(ParsedPart::Text(text.to_string()));
        }
        parts
    }

    fn has_tool_markers(&self, text: &str, _tools: &[Tool], options: &ParseOptions) -> bool {
        text.contains(&format!("<{}>", call_tag(options)))
    }

    fn start_markers(&self, _tools: &[Tool], options: &ParseOptions) -> Vec<String> {
        vec![format!("<{}>", call_tag(options))]
    }

    fn find_complete_call(
        &self,
        buffer: &str,
        _tools: &[Tool],
        options: &ParseOptions,
    ) -> Option<usize> {
        let close = format!("</{}>", call_tag(options));
        buffer.find(&close).map(|at| at + close.len())
    }
}
