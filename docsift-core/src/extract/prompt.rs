// Prompt construction for structured extraction.

use crate::types::{ExtractedRecord, FieldSpec};

use super::json::to_pretty_json;

/// Sample object shown to the model, built from each field's example value.
pub fn example_record(fields: &[FieldSpec]) -> ExtractedRecord {
    fields
        .iter()
        .map(|f| (f.key.clone(), serde_json::Value::String(f.example.clone())))
        .collect()
}

/// Build the JSON-only extraction prompt for `raw_text`.
///
/// The prompt lists every field by description, embeds the OCR text
/// verbatim, and closes with an example object keyed by the field keys so
/// the model answers with those exact keys.
pub fn build_extraction_prompt(fields: &[FieldSpec], raw_text: &str) -> String {
    let mut prompt = String::from(
        "Extract the following details from the given text and return in JSON format:\n",
    );
    for field in fields {
        prompt.push_str("- ");
        prompt.push_str(&field.description);
        if field.description != field.key {
            prompt.push_str(&format!(" (key: \"{}\")", field.key));
        }
        prompt.push('\n');
    }
    prompt.push_str("\n\nRaw Text:\n");
    prompt.push_str(raw_text);
    prompt.push_str("\n\nFormat the response strictly as JSON without any extra text.\n");
    prompt.push_str("Use null for any detail that is not present in the text.\n");
    prompt.push_str("Example:\n");
    prompt.push_str(&to_pretty_json(&example_record(fields)));
    prompt.push('\n');
    prompt
}
