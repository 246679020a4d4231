use async_trait::async_trait;
use tracing::debug;

use crate::errors::{ParserError, ParserResult};
use crate::protocol::formats::helpers::{push_text, render_call_body};
use crate::protocol::formats::strict::render_tool_response;
use crate::protocol::traits::ToolCallFormat;
use crate::protocol::types::{ParseOptions, ParsedPart, Tool, ToolCallRequest, ToolResponse};
use crate::tag_parser::{extract_arguments, ScanMode};

/// Recovering tag dialect.
///
/// Same wire shape as the strict dialect, but parsing tolerates the markup
/// real models emit: missing closers are implied by a repeated start tag or
/// by end of input, mismatched closers close through their ancestors, and a
/// coercion failure drops the field instead of the call.
#[derive(Debug, Default)]
pub struct MorphTagFormat;

impl MorphTagFormat {
    fn strict_arguments(options: &ParseOptions) -> bool {
        options.strict_arguments.unwrap_or(false)
    }
}

/// Earliest `<{tool}>` occurrence at or after `from`.
fn next_call_start(text: &str, from: usize, tools: &[Tool]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for (index, tool) in tools.iter().enumerate() {
        let marker = format!("<{}>", tool.name);
        if let Some(at) = text[from..].find(&marker) {
            let at = from + at;
            if best.map(|(b, _)| at < b).unwrap_or(true) {
                best = Some((at, index));
            }
        }
    }
    best
}

/// Where the call body opened by `<{name}>` ends: its own closer, a repeated
/// start tag, or end of input. Returns (body_end, resume_at).
fn call_body_end(text: &str, body_start: usize, name: &str) -> (usize, usize) {
    let open = format!("<{}>", name);
    let close = format!("</{}>", name);
    let next_close = text[body_start..].find(&close);
    let next_open = text[body_start..].find(&open);
    match (next_close, next_open) {
        (Some(c), Some(o)) if o < c => (body_start + o, body_start + o),
        (Some(c), _) => (body_start + c, body_start + c + close.len()),
        (None, Some(o)) => (body_start + o, body_start + o),
        (None, None) => (text.len(), text.len()),
    }
}

#[async_trait]
impl ToolCallFormat for MorphTagFormat {
    fn format_tool_call(&self, request: &ToolCallRequest) -> ParserResult<String> {
        let value = request.arguments.to_value()?;
        let map = value.as_object().ok_or_else(|| {
            ParserError::MalformedPayload("tool call arguments must be an object".to_string())
        })?;
        let mut out = format!("<{}>\n", request.name);
        render_call_body(map, &mut out);
        out.push_str(&format!("</{}>", request.name));
        Ok(out)
    }

    fn format_tool_response(&self, response: &ToolResponse) -> ParserResult<String> {
        render_tool_response(response)
    }

    fn format_system_prompt(&self, tools: &[Tool], _options: &ParseOptions) -> String {
        let mut prompt = String::from(
            "You may call tools by emitting an element named after the tool, \
             with one child element per argument:\n\
             <tool_name>\n<arg>value</arg>\n</tool_name>\n\nAvailable tools:\n",
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
        let mut parts = Vec::new();
        let mut pos = 0usize;
        while let Some((start, tool_index)) = next_call_start(text, pos, tools) {
            let tool = &tools[tool_index];
            push_text(&mut parts, &text[pos..start]);

            let body_start = start + tool.name.len() + 2;
            let (body_end, resume_at) = call_body_end(text, body_start, &tool.name);
            let extraction = extract_arguments(
                &text[body_start..body_end],
                &tool.input_schema,
                ScanMode::Recover,
            );
            for error in &extraction.errors {
                debug!(tool = %tool.name, %error, "dropped unconvertible argument");
                options.report(error);
            }
            if !extraction.errors.is_empty() && Self::strict_arguments(options) {
                push_text(&mut parts, &text[start..resume_at]);
            } else {
                parts.push(ParsedPart::ToolCall {
                    name: tool.name.clone(),
                    arguments: serde_json::to_string(&extraction.value).unwrap_or_default(),
                });
            }
            pos = resume_at;
        }
        push_text(&mut parts, &text[pos..]);

        if parts.is_empty() {
            parts.push(ParsedPart::Text(text.to_string()));
        }
        parts
    }

    fn has_tool_markers(&self, text: &str, tools: &[Tool], _options: &ParseOptions) -> bool {
        tools
            .iter()
            .any(|tool| text.contains(&format!("<{}>", tool.name)))
    }

    fn start_markers(&self, tools: &[Tool], _options: &ParseOptions) -> Vec<String> {
        tools
            .iter()
            .map(|tool| format!("<{}>", tool.name))
            .collect()
    }

    fn find_complete_call(
        &self,
        buffer: &str,
        tools: &[Tool],
        _options: &ParseOptions,
    ) -> Option<usize> {
        let tool = tools
            .iter()
            .find(|tool| buffer.starts_with(&format!("<{}>", tool.name)))?;
        let body_start = tool.name.len() + 2;
        let open = format!("<{}>", tool.name);
        let close = format!("</{}>", tool.name);
        let next_close = buffer[body_start..].find(&close);
        let next_open = buffer[body_start..].find(&open);
        match (next_close, next_open) {
            // A repeated start tag ends the call right before itself.
            (Some(c), Some(o)) if o < c => Some(body_start + o),
            (Some(c), _) => Some(body_start + c + close.len()),
            (None, Some(o)) => Some(body_start + o),
            (None, None) => None,
        }
    }
}
