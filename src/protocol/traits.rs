use async_trait::async_trait;

use crate::errors::ParserResult;

use super::types::{ParseOptions, ParsedPart, Tool, ToolCallRequest, ToolResponse};

/// One tool-call wire dialect: how calls and results are rendered for the
/// model, and how calls are recognized in its output.
///
/// `parse_generated_text` is infallible by contract. Whatever cannot be
/// decoded comes back as [`ParsedPart::Text`], with the failure reported to
/// the options' diagnostic sink.
#[async_trait]
pub trait ToolCallFormat: Send + Sync {
    /// Render an outbound tool call into this dialect's markup.
    fn format_tool_call(&self, request: &ToolCallRequest) -> ParserResult<String>;

    /// Render a tool's result for re-injection into the conversation.
    fn format_tool_response(&self, response: &ToolResponse) -> ParserResult<String>;

    /// System-prompt fragment describing the available tools and the markup
    /// the model should emit.
    fn format_system_prompt(&self, tools: &[Tool], options: &ParseOptions) -> String;

    /// Split a complete generated text into text and tool-call parts.
    async fn parse_generated_text(
        &self,
        text: &str,
        tools: &[Tool],
        options: &ParseOptions,
    ) -> Vec<ParsedPart>;

    /// Cheap probe: could `text` contain this dialect's markup at all?
    fn has_tool_markers(&self, text: &str, tools: &[Tool], options: &ParseOptions) -> bool;

    /// Byte strings whose appearance in a stream may begin a tool call.
    /// Everything before the last possible marker prefix is safe to flush
    /// as plain text.
    fn start_markers(&self, tools: &[Tool], options: &ParseOptions) -> Vec<String>;

    /// If `buffer` begins with a complete call, the byte length of that
    /// call's markup. `buffer` is guaranteed to start at a start marker.
    fn find_complete_call(
        &self,
        buffer: &str,
        tools: &[Tool],
        options: &ParseOptions,
    ) -> Option<usize>;
}
