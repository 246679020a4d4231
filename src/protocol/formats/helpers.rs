//! Shared plumbing for the concrete dialects.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::protocol::types::{ParsedPart, Tool};

/// Tool name to index lookup for O(1) validation while parsing.
pub fn get_tool_indices(tools: &[Tool]) -> HashMap<String, usize> {
    tools
        .iter()
        .enumerate()
        .map(|(i, tool)| (tool.name.clone(), i))
        .collect()
}

/// Append a text part, coalescing with a trailing text part.
pub fn push_text(parts: &mut Vec<ParsedPart>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(ParsedPart::Text(prev)) = parts.last_mut() {
        prev.push_str(text);
    } else {
        parts.push(ParsedPart::Text(text.to_string()));
    }
}

/// Drop argument keys the schema does not declare. Schemas without a
/// `properties` map pass everything through.
pub fn restrict_to_schema(arguments: &mut Value, schema: &Value) {
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return;
    };
    if let Some(map) = arguments.as_object_mut() {
        map.retain(|key, _| properties.contains_key(key));
    }
}

/// Render a JSON value as tag-markup element content.
///
/// Strings are emitted verbatim, scalars via their JSON literal, arrays as
/// `<item>` children, and objects as one nested tag per key.
pub fn render_value_body(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Array(items) => {
            for item in items {
                out.push_str("<item>");
                render_value_body(item, out);
                out.push_str("</item>");
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                render_tag_value(key, item, out);
            }
        }
    }
}

pub fn render_tag_value(key: &str, value: &Value, out: &mut String) {
    out.push('<');
    out.push_str(key);
    out.push('>');
    render_value_body(value, out);
    out.push_str("</");
    out.push_str(key);
    out.push_str(">");
}

/// Render each argument key on its own line between the call's tags.
pub fn render_call_body(arguments: &Map<String, Value>, out: &mut String) {
    for (key, value) in arguments {
        render_tag_value(key, value, out);
        out.push('\n');
    }
}

/// Length of the complete, depth-balanced call at the start of `buffer`, if
/// its closer has arrived. `buffer` must start with `<{name}>`.
pub fn find_balanced_call(buffer: &str, name: &str) -> Option<usize> {
    let open = format!("<{}>", name);
    let close = format!("</{}>", name);
    let mut depth = 1usize;
    let mut pos = open.len();
    loop {
        let next_open = buffer[pos..].find(&open).map(|i| i + pos);
        let next_close = buffer[pos..].find(&close).map(|i| i + pos)?;
        match next_open {
            Some(o) if o < next_close => {
                depth += 1;
                pos = o + open.len();
            }
            _ => {
                depth -= 1;
                pos = next_close + close.len();
                if depth == 0 {
                    return Some(pos);
                }
            }
        }
    }
}
