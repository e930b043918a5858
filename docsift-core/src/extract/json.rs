// Recovering a JSON object from free-form model output, and 4-space pretty printing.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::types::ExtractedRecord;

/// Greedy `{ ... }` span, dot matching newlines.
static OBJECT_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("static regex"));

/// A comma directly before a closing brace or bracket.
static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("static regex"));

/// Why a reply could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonRecovery {
    /// No brace-delimited span at all.
    NoObject,
    /// A span was found but it is not a JSON object.
    Malformed(String),
}

/// Return the outermost `{ ... }` span of `text`, from the first `{` to the
/// last `}`.
pub fn find_json_object(text: &str) -> Option<&str> {
    OBJECT_SPAN.find(text).map(|m| m.as_str())
}

/// Parse `text` as a JSON object, retrying once with trailing commas removed.
pub fn parse_object_lenient(text: &str) -> Result<ExtractedRecord, String> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => into_object(value),
        Err(strict_err) => {
            let repaired = TRAILING_COMMA.replace_all(text, "$1");
            if repaired == text {
                return Err(strict_err.to_string());
            }
            match serde_json::from_str::<serde_json::Value>(&repaired) {
                Ok(value) => into_object(value),
                Err(_) => Err(strict_err.to_string()),
            }
        }
    }
}

fn into_object(value: serde_json::Value) -> Result<ExtractedRecord, String> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(format!("expected a JSON object, got {}", type_name(&other))),
    }
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Locate and parse the JSON object embedded in a model reply.
pub fn recover_object(reply: &str) -> Result<ExtractedRecord, JsonRecovery> {
    let span = find_json_object(reply).ok_or(JsonRecovery::NoObject)?;
    parse_object_lenient(span).map_err(JsonRecovery::Malformed)
}

/// Serialize with a 4-space indent.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    if value.serialize(&mut ser).is_err() {
        return String::from("null");
    }
    String::from_utf8(buf).unwrap_or_default()
}
