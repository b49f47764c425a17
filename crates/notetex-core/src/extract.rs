//! Embedded PNG extraction from drawing render results
//!
//! The drawing renderer returns a JSON structure whose shape is not under our
//! control and has changed between versions. Instead of relying on a schema,
//! the extractor searches the whole structure breadth-first for the first
//! string that looks like a PNG payload.

use std::collections::VecDeque;

use serde_json::{Map, Value};
use tracing::{debug, trace};

/// Prefix of a PNG data URL; the payload follows the first comma
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png";

/// A bare base64 string must be strictly longer than this to count as a
/// payload, which rules out short alphanumeric identifiers
pub const MIN_RAW_BASE64_LEN: usize = 100;

/// Mapping keys checked before any other field, in priority order
pub const PAYLOAD_KEYS: [&str; 4] = ["src", "dataURL", "dataUrl", "base64"];

/// A render result node, classified by shape
#[derive(Debug, Clone, Copy)]
pub enum RenderValue<'a> {
    String(&'a str),
    Sequence(&'a [Value]),
    Mapping(&'a Map<String, Value>),
    /// Null, booleans and numbers
    Other,
}

impl<'a> From<&'a Value> for RenderValue<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::String(s) => RenderValue::String(s),
            Value::Array(items) => RenderValue::Sequence(items),
            Value::Object(map) => RenderValue::Mapping(map),
            Value::Null | Value::Bool(_) | Value::Number(_) => RenderValue::Other,
        }
    }
}

/// Find the first base64 PNG payload in a render result
///
/// Returns the payload without any data URL header, borrowed from `result`,
/// or `None` when no string in the structure qualifies.
pub fn extract_png_base64(result: &Value) -> Option<&str> {
    let mut queue: VecDeque<&Value> = VecDeque::new();
    queue.push_back(result);
    let mut visited = 0usize;

    while let Some(value) = queue.pop_front() {
        visited += 1;
        match RenderValue::from(value) {
            RenderValue::String(s) => {
                if let Some(payload) = payload_from_str(s) {
                    debug!(visited, "found PNG payload");
                    return Some(payload);
                }
            }
            RenderValue::Sequence(items) => queue.extend(items),
            RenderValue::Mapping(map) => {
                for key in PAYLOAD_KEYS {
                    if let Some(payload) = map
                        .get(key)
                        .and_then(Value::as_str)
                        .and_then(payload_from_str)
                    {
                        debug!(visited, key, "found PNG payload under known key");
                        return Some(payload);
                    }
                }
                queue.extend(map.values());
            }
            RenderValue::Other => {}
        }
    }

    trace!(visited, "no PNG payload in render result");
    None
}

/// Payload carried by a single string, if it is a PNG data URL or a long
/// bare base64 string
pub fn payload_from_str(s: &str) -> Option<&str> {
    if s.is_empty() {
        return None;
    }
    if s.starts_with(PNG_DATA_URL_PREFIX) {
        let (_, rest) = s.split_once(',')?;
        let payload = rest.split(',').next().unwrap_or_default();
        return (!payload.is_empty()).then_some(payload);
    }
    if s.len() > MIN_RAW_BASE64_LEN && is_base64_alphabet(s) {
        return Some(s);
    }
    None
}

fn is_base64_alphabet(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}
