mod common;

use std::sync::Arc;

use common::{create_test_tools, ErrorCollector};
use serde_json::{json, Value};
use tool_call_middleware::{MorphTagFormat, ParseOptions, ParsedPart, ParserError, ToolCallFormat};

fn args_of(part: &ParsedPart) -> Value {
    match part {
        ParsedPart::ToolCall { arguments, .. } => serde_json::from_str(arguments).unwrap(),
        other => panic!("expected tool call, got {:?}", other),
    }
}

#[tokio::test]
async fn test_recovery_equivalence_missing_inner_closer() {
    let format = MorphTagFormat;
    let tools = create_test_tools();
    let options = ParseOptions::default();

    let closed = format
        .parse_generated_text(
            "<get_weather><location>x</location></get_weather>",
            &tools,
            &options,
        )
        .await;
    let unclosed = format
        .parse_generated_text("<get_weather><location>x</get_weather>", &tools, &options)
        .await;

    assert_eq!(closed, unclosed);
    assert_eq!(closed.len(), 1);
    assert_eq!(args_of(&closed[0]), json!({"location": "x"}));
}

#[tokio::test]
async fn test_missing_final_closer_closes_at_end_of_input() {
    let format = MorphTagFormat;
    let parts = format
        .parse_generated_text(
            "checking: <get_weather><location>Oslo</location>",
            &create_test_tools(),
            &ParseOptions::default(),
        )
        .await;

    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0], ParsedPart::Text("checking: ".to_string()));
    assert_eq!(args_of(&parts[1]), json!({"location": "Oslo"}));
}

#[tokio::test]
async fn test_sibling_start_tag_implies_close() {
    let format = MorphTagFormat;
    let text = "<search><query>a<search><query>b</search>";
    let parts = format
        .parse_generated_text(text, &create_test_tools(), &ParseOptions::default())
        .await;

    assert_eq!(parts.len(), 2);
    assert_eq!(args_of(&parts[0]), json!({"query": "a"}));
    assert_eq!(args_of(&parts[1]), json!({"query": "b"}));
}

#[tokio::test]
async fn test_tag_like_code_payload_survives_verbatim() {
    let format = MorphTagFormat;
    let text = "<code_interpreter><language>rust</language><code>\nlet v = Vec::<i32>::new();\nif a < b { run(v); }\n</code></code_interpreter>";
    let parts = format
        .parse_generated_text(text, &create_test_tools(), &ParseOptions::default())
        .await;

    assert_eq!(parts.len(), 1);
    assert_eq!(
        args_of(&parts[0]),
        json!({
            "language": "rust",
            "code": "let v = Vec::<i32>::new();\nif a < b { run(v); }"
        })
    );
}

#[tokio::test]
async fn test_stray_closer_inside_call_body_is_dropped() {
    let format = MorphTagFormat;
    let parts = format
        .parse_generated_text(
            "<get_weather></oops><location>Seoul</location></get_weather>",
            &create_test_tools(),
            &ParseOptions::default(),
        )
        .await;

    assert_eq!(parts.len(), 1);
    assert_eq!(args_of(&parts[0]), json!({"location": "Seoul"}));
}

#[tokio::test]
async fn test_coercion_failure_drops_field_by_default() {
    let format = MorphTagFormat;
    let sink = Arc::new(ErrorCollector::default());
    let options = ParseOptions {
        on_error: Some(sink.clone()),
        ..Default::default()
    };
    let parts = format
        .parse_generated_text(
            "<search><query>q</query><limit>lots</limit></search>",
            &create_test_tools(),
            &options,
        )
        .await;

    assert_eq!(parts.len(), 1);
    assert_eq!(args_of(&parts[0]), json!({"query": "q"}));
    assert!(matches!(sink.take()[0], ParserError::Coercion { .. }));
}

#[tokio::test]
async fn test_strict_arguments_override_degrades_call() {
    let format = MorphTagFormat;
    let options = ParseOptions {
        strict_arguments: Some(true),
        ..Default::default()
    };
    let text = "<search><query>q</query><limit>lots</limit></search>";
    let parts = format
        .parse_generated_text(text, &create_test_tools(), &options)
        .await;
    assert_eq!(parts, vec![ParsedPart::Text(text.to_string())]);
}

#[tokio::test]
async fn test_stray_closer_and_prose_pass_through() {
    let format = MorphTagFormat;
    let text = "a </nope> b, and a < b too";
    let parts = format
        .parse_generated_text(text, &create_test_tools(), &ParseOptions::default())
        .await;
    assert_eq!(parts, vec![ParsedPart::Text(text.to_string())]);
}
