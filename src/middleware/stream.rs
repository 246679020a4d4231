use std::sync::Arc;

use crate::protocol::{ContentPart, ParseOptions, ParsedPart, Tool, ToolCallFormat};
use crate::tag_parser::safe_flush_index;

use super::id::CallIdGenerator;

/// Incremental parse state for one generation stream.
///
/// Feed deltas of arbitrary size; parts come back the moment they are
/// final. Prose ahead of any possible start marker flushes immediately, a
/// run that could still become a marker is held back, and a complete call's
/// markup is parsed the same way the whole-text path would parse it. After
/// coalescing adjacent text parts the output is identical for any chunking
/// of the same total text. Text flushed ahead of a marker is final: if the
/// retained region later fails to parse, degradation to original text covers
/// that region only, not already-emitted prose.
pub struct StreamState {
    format: Arc<dyn ToolCallFormat>,
    id_generator: Arc<dyn CallIdGenerator>,
    options: ParseOptions,
    tools: Vec<Tool>,
    markers: Vec<String>,
    pending: String,
}

impl StreamState {
    pub(crate) fn new(
        format: Arc<dyn ToolCallFormat>,
        id_generator: Arc<dyn CallIdGenerator>,
        options: ParseOptions,
        tools: Vec<Tool>,
    ) -> Self {
        let markers = format.start_markers(&tools, &options);
        Self {
            format,
            id_generator,
            options,
            tools,
            markers,
            pending: String::new(),
        }
    }

    /// Feed the next delta; returns every part finalized by it.
    pub async fn push_delta(&mut self, delta: &str) -> Vec<ContentPart> {
        self.pending.push_str(delta);
        self.drain().await
    }

    /// Signal end of generation. Whatever is still buffered gets one final
    /// whole-text parse, so a call cut off mid-markup still goes through the
    /// dialect's recovery rather than leaking raw text.
    pub async fn finish(&mut self) -> Vec<ContentPart> {
        let mut out = self.drain().await;
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            let parts = self
                .format
                .parse_generated_text(&tail, &self.tools, &self.options)
                .await;
            self.emit(parts, &mut out);
        }
        out
    }

    async fn drain(&mut self) -> Vec<ContentPart> {
        let mut out = Vec::new();
        loop {
            let flush = safe_flush_index(&self.pending, &self.markers);
            if flush > 0 {
                let text: String = self.pending.drain(..flush).collect();
                push_part_text(&mut out, &text);
                continue;
            }
            // The buffer now begins at a marker or a possible marker prefix.
            let at_marker = self
                .markers
                .iter()
                .any(|marker| self.pending.starts_with(marker.as_str()));
            if !at_marker {
                break;
            }
            let Some(end) =
                self.format
                    .find_complete_call(&self.pending, &self.tools, &self.options)
            else {
                break;
            };
            let call_text: String = self.pending.drain(..end).collect();
            let parts = self
                .format
                .parse_generated_text(&call_text, &self.tools, &self.options)
                .await;
            self.emit(parts, &mut out);
        }
        out
    }

    fn emit(&self, parts: Vec<ParsedPart>, out: &mut Vec<ContentPart>) {
        for part in parts {
            match part {
                ParsedPart::Text(text) => push_part_text(out, &text),
                ParsedPart::ToolCall { name, arguments } => out.push(ContentPart::ToolCall {
                    id: self.id_generator.next_id(),
                    name,
                    arguments,
                }),
            }
        }
    }
}

/// Append a text part, coalescing with a trailing one.
pub(crate) fn push_part_text(out: &mut Vec<ContentPart>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(ContentPart::Text { text: prev }) = out.last_mut() {
        prev.push_str(text);
    } else {
        out.push(ContentPart::Text {
            text: text.to_string(),
        });
    }
}
