use serde_json::{Map, Number, Value};

use crate::errors::ParserError;

use super::tokenizer::{scan_tag, TagScan, Token};
use super::tree::{ScanMode, MAX_DEPTH};

/// Best-effort result of a schema-guided extraction.
///
/// `value` always holds whatever coerced cleanly; field-scoped failures are
/// accumulated in `errors` so the protocol layer can decide between dropping
/// the field and degrading the whole call.
#[derive(Debug, Default)]
pub struct Extraction {
    pub value: Value,
    pub errors: Vec<ParserError>,
}

/// Coerce a raw tool-call body (sibling tag/text fragments with no root
/// element) against an `object`-shaped schema fragment.
///
/// Coercion policy per declared type:
/// - `string`: the field's inner text verbatim, one outer trim;
/// - `number`/`integer`/`boolean`: trimmed literal parse, failure recorded
///   with the field path;
/// - `array`: direct child elements positionally, each per `items`;
/// - `object`: declared `properties` matched by child tag name, missing keys
///   omitted, undeclared children ignored;
/// - untyped: JSON literal first, string fallback.
///
/// A `string` field's content is opaque: its closing tag is located by raw
/// search and scanning never re-enters the body, so tag-like payloads such
/// as source code survive byte for byte.
pub fn extract_arguments(body: &str, schema: &Value, mode: ScanMode) -> Extraction {
    let mut errors = Vec::new();
    let value = coerce_object_fragment(body, schema, "", mode, 0, &mut errors);
    Extraction { value, errors }
}

/// A direct child element located in a raw fragment.
struct RawElement<'a> {
    name: String,
    inner: &'a str,
    /// Byte offset just past the element within the fragment.
    end: usize,
}

fn next_element(fragment: &str, from: usize, mode: ScanMode) -> Option<RawElement<'_>> {
    let bytes = fragment.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        match scan_tag(&fragment[i..]) {
            TagScan::Complete(Token::TagOpen { name, .. }, tag_len) => {
                let content_start = i + tag_len;
                let (inner_end, after_end) = element_end(fragment, &name, content_start, mode);
                return Some(RawElement {
                    name,
                    inner: &fragment[content_start..inner_end],
                    end: after_end,
                });
            }
            TagScan::Complete(Token::TagClose { .. }, tag_len)
                if mode == ScanMode::Recover =>
            {
                // Stray closer; drop it and keep looking for the next field.
                i += tag_len;
            }
            TagScan::Complete(..) => {
                // In strict mode a closer at this level belongs to an
                // enclosing element; nothing more to find here.
                return None;
            }
            TagScan::Incomplete => return None,
            TagScan::NotATag => i += 1,
        }
    }
    None
}

/// Find where the element's content ends, by raw search for the matching
/// closer. Recovery mode also honors the sibling-implies-close rule and the
/// implied close at end of fragment.
fn element_end(fragment: &str, name: &str, content_start: usize, mode: ScanMode) -> (usize, usize) {
    let open = format!("<{}>", name);
    let close = format!("</{}>", name);

    match mode {
        ScanMode::Strict => {
            let mut depth = 1usize;
            let mut pos = content_start;
            loop {
                let next_open = fragment[pos..].find(&open).map(|i| i + pos);
                let next_close = fragment[pos..].find(&close).map(|i| i + pos);
                match (next_open, next_close) {
                    (Some(o), Some(c)) if o < c => {
                        depth += 1;
                        pos = o + open.len();
                    }
                    (_, Some(c)) => {
                        depth -= 1;
                        if depth == 0 {
                            return (c, c + close.len());
                        }
                        pos = c + close.len();
                    }
                    (_, None) => return (fragment.len(), fragment.len()),
                }
            }
        }
        ScanMode::Recover => {
            let next_close = fragment[content_start..].find(&close);
            let next_open = fragment[content_start..].find(&open);
            match (next_close, next_open) {
                (Some(c), Some(o)) if o < c => {
                    // A repeated start tag closes this element first.
                    (content_start + o, content_start + o)
                }
                (Some(c), _) => (content_start + c, content_start + c + close.len()),
                (None, Some(o)) => (content_start + o, content_start + o),
                (None, None) => (fragment.len(), fragment.len()),
            }
        }
    }
}

fn find_element_named<'a>(
    fragment: &'a str,
    name: &str,
    mode: ScanMode,
) -> Option<RawElement<'a>> {
    let mut from = 0;
    while let Some(element) = next_element(fragment, from, mode) {
        if element.name == name {
            return Some(element);
        }
        from = element.end.max(from + 1);
    }
    None
}

fn coerce_object_fragment(
    body: &str,
    schema: &Value,
    path: &str,
    mode: ScanMode,
    depth: usize,
    errors: &mut Vec<ParserError>,
) -> Value {
    let mut map = Map::new();
    if depth > MAX_DEPTH {
        errors.push(ParserError::DepthExceeded(MAX_DEPTH));
        return Value::Object(map);
    }
    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, subschema) in properties {
            if let Some(element) = find_element_named(body, key, mode) {
                let child_path = join_path(path, key);
                if let Some(value) =
                    coerce_fragment(element.inner, subschema, &child_path, mode, depth + 1, errors)
                {
                    map.insert(key.clone(), value);
                }
            }
        }
    }
    Value::Object(map)
}

fn coerce_fragment(
    raw: &str,
    schema: &Value,
    path: &str,
    mode: ScanMode,
    depth: usize,
    errors: &mut Vec<ParserError>,
) -> Option<Value> {
    if depth > MAX_DEPTH {
        errors.push(ParserError::DepthExceeded(MAX_DEPTH));
        return None;
    }
    let declared = schema.get("type").and_then(|t| t.as_str()).unwrap_or("");
    match declared {
        "string" => Some(Value::String(raw.trim().to_string())),
        "number" => {
            let text = raw.trim();
            if let Ok(n) = text.parse::<i64>() {
                return Some(Value::Number(Number::from(n)));
            }
            match text.parse::<f64>().ok().and_then(Number::from_f64) {
                Some(n) => Some(Value::Number(n)),
                None => {
                    errors.push(coercion_error(path, "number", text));
                    None
                }
            }
        }
        "integer" => match raw.trim().parse::<i64>() {
            Ok(n) => Some(Value::Number(Number::from(n))),
            Err(_) => {
                errors.push(coercion_error(path, "integer", raw.trim()));
                None
            }
        },
        "boolean" => {
            let text = raw.trim();
            if text.eq_ignore_ascii_case("true") {
                Some(Value::Bool(true))
            } else if text.eq_ignore_ascii_case("false") {
                Some(Value::Bool(false))
            } else {
                errors.push(coercion_error(path, "boolean", text));
                None
            }
        }
        "array" => {
            let items_schema = schema.get("items").cloned().unwrap_or(Value::Null);
            let mut items = Vec::new();
            let mut from = 0;
            let mut index = 0usize;
            // Direct child elements count positionally, whatever their tag.
            while let Some(element) = next_element(raw, from, mode) {
                let child_path = format!("{}[{}]", path, index);
                if let Some(value) =
                    coerce_fragment(element.inner, &items_schema, &child_path, mode, depth + 1, errors)
                {
                    items.push(value);
                }
                from = element.end.max(from + 1);
                index += 1;
            }
            Some(Value::Array(items))
        }
        "object" => Some(coerce_object_fragment(raw, schema, path, mode, depth + 1, errors)),
        _ => Some(literal_value(raw)),
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn coercion_error(path: &str, expected: &'static str, text: &str) -> ParserError {
    ParserError::Coercion {
        path: path.to_string(),
        expected,
        message: format!("got {:?}", text),
    }
}

/// Coercion for fields with no declared type: JSON literal first, then the
/// trimmed text as a string.
fn literal_value(raw: &str) -> Value {
    let text = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return value;
    }
    Value::String(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_string_field() {
        let schema = json!({"type": "object", "properties": {"location": {"type": "string"}}});
        let extraction =
            extract_arguments("<location>Seoul</location>", &schema, ScanMode::Strict);
        assert!(extraction.errors.is_empty());
        assert_eq!(extraction.value, json!({"location": "Seoul"}));
    }

    #[test]
    fn test_multiline_payload_preserved() {
        let schema = json!({"type": "object", "properties": {"code": {"type": "string"}}});
        let body = "<code>\nfn main() {\n    if a < b && v == \"<tag>\" {\n        run();\n    }\n}\n</code>";
        let extraction = extract_arguments(body, &schema, ScanMode::Recover);
        assert!(extraction.errors.is_empty());
        assert_eq!(
            extraction.value["code"],
            json!("fn main() {\n    if a < b && v == \"<tag>\" {\n        run();\n    }\n}")
        );
    }

    #[test]
    fn test_numeric_and_boolean() {
        let schema = json!({"type": "object", "properties": {
            "count": {"type": "integer"},
            "rate": {"type": "number"},
            "enabled": {"type": "boolean"}
        }});
        let body = "<count>42</count><rate>1.5</rate><enabled>True</enabled>";
        let extraction = extract_arguments(body, &schema, ScanMode::Strict);
        assert!(extraction.errors.is_empty());
        assert_eq!(
            extraction.value,
            json!({"count": 42, "rate": 1.5, "enabled": true})
        );
    }

    #[test]
    fn test_coercion_error_is_field_scoped() {
        let schema = json!({"type": "object", "properties": {
            "count": {"type": "integer"},
            "note": {"type": "string"}
        }});
        let body = "<count>lots</count><note>kept</note>";
        let extraction = extract_arguments(body, &schema, ScanMode::Strict);
        assert_eq!(extraction.errors.len(), 1);
        assert!(matches!(
            &extraction.errors[0],
            ParserError::Coercion { path, expected: "integer", .. } if path == "count"
        ));
        // The failing field is absent; the rest still coerces.
        assert_eq!(extraction.value, json!({"note": "kept"}));
    }

    #[test]
    fn test_nested_object_and_array() {
        let schema = json!({"type": "object", "properties": {
            "origin": {"type": "object", "properties": {
                "city": {"type": "string"},
                "zip": {"type": "integer"}
            }},
            "tags": {"type": "array", "items": {"type": "string"}}
        }});
        let body = "<origin><city>Busan</city><zip>604</zip></origin>\
                    <tags><item>a</item><item>b</item></tags>";
        let extraction = extract_arguments(body, &schema, ScanMode::Strict);
        assert!(extraction.errors.is_empty());
        assert_eq!(
            extraction.value,
            json!({"origin": {"city": "Busan", "zip": 604}, "tags": ["a", "b"]})
        );
    }

    #[test]
    fn test_array_children_counted_positionally() {
        let schema = json!({"type": "object", "properties": {
            "values": {"type": "array", "items": {"type": "integer"}}
        }});
        // Tag names of array children are irrelevant.
        let body = "<values><v>1</v><entry>2</entry><x>3</x></values>";
        let extraction = extract_arguments(body, &schema, ScanMode::Strict);
        assert_eq!(extraction.value, json!({"values": [1, 2, 3]}));
    }

    #[test]
    fn test_missing_keys_omitted_and_extras_ignored() {
        let schema = json!({"type": "object", "properties": {
            "a": {"type": "string"},
            "b": {"type": "string"}
        }});
        let body = "<a>present</a><z>ignored</z>";
        let extraction = extract_arguments(body, &schema, ScanMode::Strict);
        assert_eq!(extraction.value, json!({"a": "present"}));
    }

    #[test]
    fn test_recover_skips_stray_closer_between_fields() {
        let schema = json!({"type": "object", "properties": {
            "a": {"type": "string"},
            "b": {"type": "string"}
        }});
        let body = "<a>1</a></oops><b>2</b>";
        let extraction = extract_arguments(body, &schema, ScanMode::Recover);
        assert!(extraction.errors.is_empty());
        assert_eq!(extraction.value, json!({"a": "1", "b": "2"}));
    }

    #[test]
    fn test_recover_missing_closer_extends_to_end() {
        let schema = json!({"type": "object", "properties": {"q": {"type": "string"}}});
        let extraction = extract_arguments("<q>last field", &schema, ScanMode::Recover);
        assert_eq!(extraction.value, json!({"q": "last field"}));
    }

    #[test]
    fn test_untyped_field_uses_json_literal() {
        let schema = json!({"type": "object", "properties": {"x": {}, "y": {}}});
        let body = "<x>{\"k\": 1}</x><y>plain</y>";
        let extraction = extract_arguments(body, &schema, ScanMode::Strict);
        assert_eq!(extraction.value, json!({"x": {"k": 1}, "y": "plain"}));
    }
}
