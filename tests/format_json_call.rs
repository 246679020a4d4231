mod common;

use std::sync::Arc;

use common::{create_test_tools, ErrorCollector};
use serde_json::{json, Value};
use tool_call_middleware::{JsonCallFormat, ParseOptions, ParsedPart, ParserError, ToolCallFormat};

fn args_of(part: &ParsedPart) -> Value {
    match part {
        ParsedPart::ToolCall { arguments, .. } => serde_json::from_str(arguments).unwrap(),
        other => panic!("expected tool call, got {:?}", other),
    }
}

#[tokio::test]
async fn test_single_embedded_call() {
    let format = JsonCallFormat;
    let text = "Let me check. <tool_call>{\"name\": \"get_weather\", \"arguments\": {\"location\": \"Paris\"}}</tool_call>";
    let parts = format
        .parse_generated_text(text, &create_test_tools(), &ParseOptions::default())
        .await;

    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0], ParsedPart::Text("Let me check. ".to_string()));
    match &parts[1] {
        ParsedPart::ToolCall { name, .. } => assert_eq!(name, "get_weather"),
        other => panic!("expected tool call, got {:?}", other),
    }
    assert_eq!(args_of(&parts[1]), json!({"location": "Paris"}));
}

#[tokio::test]
async fn test_malformed_payload_degrades_single_occurrence() {
    let format = JsonCallFormat;
    let sink = Arc::new(ErrorCollector::default());
    let options = ParseOptions {
        on_error: Some(sink.clone()),
        ..Default::default()
    };
    let text = "<tool_call>{not json}</tool_call> then <tool_call>{\"name\": \"search\", \"arguments\": {\"query\": \"ok\"}}</tool_call>";
    let parts = format
        .parse_generated_text(text, &create_test_tools(), &options)
        .await;

    // The broken occurrence passes through with its tags; its sibling parses.
    assert_eq!(parts.len(), 2);
    assert_eq!(
        parts[0],
        ParsedPart::Text("<tool_call>{not json}</tool_call> then ".to_string())
    );
    assert_eq!(args_of(&parts[1]), json!({"query": "ok"}));
    assert!(matches!(sink.take()[0], ParserError::MalformedPayload(_)));
}

#[tokio::test]
async fn test_unknown_tool_passes_through() {
    let format = JsonCallFormat;
    let sink = Arc::new(ErrorCollector::default());
    let options = ParseOptions {
        on_error: Some(sink.clone()),
        ..Default::default()
    };
    let text = "<tool_call>{\"name\": \"rm_rf\", \"arguments\": {}}</tool_call>";
    let parts = format
        .parse_generated_text(text, &create_test_tools(), &options)
        .await;

    // Unknown tool names are plain text, not diagnostics.
    assert_eq!(parts, vec![ParsedPart::Text(text.to_string())]);
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn test_custom_sentinel_tag() {
    let format = JsonCallFormat;
    let options = ParseOptions {
        tool_call_tag: Some("fc".to_string()),
        ..Default::default()
    };
    let text = "<fc>{\"name\": \"search\", \"arguments\": {\"query\": \"x\"}}</fc> \
                <tool_call>{\"name\": \"search\", \"arguments\": {}}</tool_call>";
    let parts = format
        .parse_generated_text(text, &create_test_tools(), &options)
        .await;

    // Only the configured tag is recognized; the default one stays text.
    assert_eq!(parts.len(), 2);
    assert_eq!(args_of(&parts[0]), json!({"query": "x"}));
    match &parts[1] {
        ParsedPart::Text(t) => assert!(t.contains("<tool_call>")),
        other => panic!("expected text, got {:?}", other),
    }
}

#[tokio::test]
async fn test_string_encoded_arguments_are_unwrapped() {
    let format = JsonCallFormat;
    let text = r#"<tool_call>{"name": "get_weather", "arguments": "{\"location\": \"Oslo\"}"}</tool_call>"#;
    let parts = format
        .parse_generated_text(text, &create_test_tools(), &ParseOptions::default())
        .await;
    assert_eq!(args_of(&parts[0]), json!({"location": "Oslo"}));
}

#[tokio::test]
async fn test_parameters_key_alias() {
    let format = JsonCallFormat;
    let text = "<tool_call>{\"name\": \"search\", \"parameters\": {\"query\": \"alias\"}}</tool_call>";
    let parts = format
        .parse_generated_text(text, &create_test_tools(), &ParseOptions::default())
        .await;
    assert_eq!(args_of(&parts[0]), json!({"query": "alias"}));
}

#[tokio::test]
async fn test_undeclared_arguments_are_dropped() {
    let format = JsonCallFormat;
    let text = "<tool_call>{\"name\": \"search\", \"arguments\": {\"query\": \"q\", \"verbose\": true}}</tool_call>";
    let parts = format
        .parse_generated_text(text, &create_test_tools(), &ParseOptions::default())
        .await;
    assert_eq!(args_of(&parts[0]), json!({"query": "q"}));
}
