use std::collections::HashMap;

use async_trait::async_trait;
use tracing::warn;

use crate::errors::{ParserError, ParserResult};
use crate::protocol::formats::helpers::{
    find_balanced_call, get_tool_indices, push_text, render_call_body, render_value_body,
};
use crate::protocol::traits::ToolCallFormat;
use crate::protocol::types::{ParseOptions, ParsedPart, Tool, ToolCallRequest, ToolResponse};
use crate::tag_parser::{parse_document, Node, NodeContent, ScanMode};

/// Well-formed tag dialect.
///
/// Calls are elements named after a tool, with one child element per
/// argument. Parsing requires balanced markup; a structural failure degrades
/// the whole text, and by default a coercion failure degrades the failing
/// call. Tool-named elements are recognized at any nesting depth, but a
/// call's own body is never searched for further calls.
#[derive(Debug, Default)]
pub struct StrictTagFormat;

impl StrictTagFormat {
    fn strict_arguments(options: &ParseOptions) -> bool {
        options.strict_arguments.unwrap_or(true)
    }
}

fn collect_calls<'a>(
    contents: &'a [NodeContent],
    indices: &HashMap<String, usize>,
    out: &mut Vec<&'a Node>,
) {
    for content in contents {
        if let NodeContent::Element(node) = content {
            if indices.contains_key(&node.tag_name) {
                out.push(node);
            } else {
                collect_calls(&node.children, indices, out);
            }
        }
    }
}

#[async_trait]
impl ToolCallFormat for StrictTagFormat {
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
        let mut result = String::new();
        render_value_body(&response.output, &mut result);
        Ok(format!(
            "<tool_response><tool_name>{}</tool_name><result>{}</result></tool_response>",
            response.tool_name, result
        ))
    }

    fn format_system_prompt(&self, tools: &[Tool], _options: &ParseOptions) -> String {
        let mut prompt = String::from(
            "You may call tools. To call one, emit an element named after the \
             tool, with one child element per argument:\n\
             <tool_name>\n<arg>value</arg>\n</tool_name>\n\
             Close every tag you open.\n\nAvailable tools:\n",
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
        let indices = get_tool_indices(tools);
        let roots = match parse_document(text, ScanMode::Strict) {
            Ok(roots) => roots,
            Err(error) => {
                warn!(%error, "malformed tag markup, passing text through");
                options.report(&error);
                return vec![ParsedPart::Text(text.to_string())];
            }
        };

        let mut calls = Vec::new();
        collect_calls(&roots, &indices, &mut calls);

        let mut parts = Vec::new();
        let mut pos = 0usize;
        for node in calls {
            push_text(&mut parts, &text[pos..node.span.start]);
            pos = node.span.end;

            let tool = &tools[indices[&node.tag_name]];
            let extraction = crate::tag_parser::extract_arguments(
                &text[node.inner_span.clone()],
                &tool.input_schema,
                ScanMode::Strict,
            );
            for error in &extraction.errors {
                options.report(error);
            }
            if !extraction.errors.is_empty() && Self::strict_arguments(options) {
                warn!(tool = %tool.name, "argument coercion failed, degrading call to text");
                push_text(&mut parts, &text[node.span.clone()]);
                continue;
            }
            parts.push(ParsedPart::ToolCall {
                name: tool.name.clone(),
                arguments: serde_json::to_string(&extraction.value).unwrap_or_default(),
            });
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
        find_balanced_call(buffer, &tool.name)
    }
}

/// The shared result-envelope renderer; the tag dialects agree on it.
pub(crate) fn render_tool_response(response: &ToolResponse) -> ParserResult<String> {
    StrictTagFormat.format_tool_response(response)
}
