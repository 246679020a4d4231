#![allow(dead_code)]

use std::sync::Mutex;

use serde_json::json;
use tool_call_middleware::{DiagnosticSink, ParserError, Tool};

/// Standard tool set shared by the integration tests.
pub fn create_test_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: "get_weather".to_string(),
            description: Some("Get current weather for a location".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "location": {"type": "string"},
                    "unit": {"type": "string"}
                }
            }),
        },
        Tool {
            name: "search".to_string(),
            description: Some("Search the web".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "limit": {"type": "integer"}
                }
            }),
        },
        Tool {
            name: "code_interpreter".to_string(),
            description: Some("Run a code snippet".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "language": {"type": "string"},
                    "code": {"type": "string"}
                }
            }),
        },
    ]
}

/// Diagnostic sink that records every reported error.
#[derive(Default)]
pub struct ErrorCollector {
    errors: Mutex<Vec<ParserError>>,
}

impl ErrorCollector {
    pub fn take(&self) -> Vec<ParserError> {
        std::mem::take(&mut *self.errors.lock().unwrap())
    }

    pub fn count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

impl DiagnosticSink for ErrorCollector {
    fn report(&self, error: &ParserError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}
