//! The orchestrating layer: pick a dialect, parse whole texts or live
//! streams, and hand back uniform content parts with assigned call ids.

pub mod id;
pub mod stream;

use std::collections::VecDeque;
use std::sync::Arc;

use futures::{Stream, StreamExt};

use crate::errors::ParserResult;
use crate::protocol::{
    ContentPart, ParseOptions, ParsedPart, Tool, ToolCallFormat, ToolCallRequest, ToolResponse,
};

pub use id::{CallIdGenerator, SequentialCallIds, UuidCallIds};
pub use stream::StreamState;

/// Dialect-agnostic front door.
///
/// Wraps one [`ToolCallFormat`] together with an id generator and per-request
/// options. Parsing never fails outward: undecodable regions come back as
/// text parts and the failure goes to the options' diagnostic sink.
pub struct ToolCallMiddleware {
    format: Arc<dyn ToolCallFormat>,
    id_generator: Arc<dyn CallIdGenerator>,
    options: ParseOptions,
}

impl ToolCallMiddleware {
    pub fn new(format: Arc<dyn ToolCallFormat>) -> Self {
        Self {
            format,
            id_generator: Arc::new(UuidCallIds),
            options: ParseOptions::default(),
        }
    }

    pub fn with_id_generator(mut self, id_generator: Arc<dyn CallIdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn format(&self) -> &Arc<dyn ToolCallFormat> {
        &self.format
    }

    /// Render an outbound tool call in the configured dialect.
    pub fn render_tool_call(&self, request: &ToolCallRequest) -> ParserResult<String> {
        self.format.format_tool_call(request)
    }

    /// Render a tool's result in the configured dialect.
    pub fn render_tool_response(&self, response: &ToolResponse) -> ParserResult<String> {
        self.format.format_tool_response(response)
    }

    /// System-prompt fragment advertising `tools` in the configured dialect.
    pub fn system_prompt(&self, tools: &[Tool]) -> String {
        self.format.format_system_prompt(tools, &self.options)
    }

    /// Parse a complete generated text into content parts with call ids.
    pub async fn run_generated_text(&self, text: &str, tools: &[Tool]) -> Vec<ContentPart> {
        let parts = self
            .format
            .parse_generated_text(text, tools, &self.options)
            .await;
        let mut out = Vec::new();
        for part in parts {
            match part {
                ParsedPart::Text(text) => stream::push_part_text(&mut out, &text),
                ParsedPart::ToolCall { name, arguments } => out.push(ContentPart::ToolCall {
                    id: self.id_generator.next_id(),
                    name,
                    arguments,
                }),
            }
        }
        out
    }

    /// Fresh incremental state for one generation stream.
    pub fn stream_state(&self, tools: &[Tool]) -> StreamState {
        StreamState::new(
            self.format.clone(),
            self.id_generator.clone(),
            self.options.clone(),
            tools.to_vec(),
        )
    }

    /// Adapt a stream of text deltas into a stream of content parts.
    pub fn wrap_stream<S>(&self, deltas: S, tools: &[Tool]) -> impl Stream<Item = ContentPart>
    where
        S: Stream<Item = String> + Unpin,
    {
        let state = self.stream_state(tools);
        futures::stream::unfold(
            (deltas, state, VecDeque::new(), false),
            |(mut deltas, mut state, mut queue, mut done)| async move {
                loop {
                    if let Some(part) = queue.pop_front() {
                        return Some((part, (deltas, state, queue, done)));
                    }
                    if done {
                        return None;
                    }
                    match deltas.next().await {
                        Some(delta) => queue.extend(state.push_delta(&delta).await),
                        None => {
                            queue.extend(state.finish().await);
                            done = true;
                        }
                    }
                }
            },
        )
    }
}
