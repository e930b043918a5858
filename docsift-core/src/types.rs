// Core data model: document kinds, field specs, records, and validation issues.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A structured record as returned by the LLM: an ordered JSON object.
pub type ExtractedRecord = serde_json::Map<String, serde_json::Value>;

// ── Document kind ───────────────────────────────────────────────────

/// The two input families the OCR stage knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Image,
    Pdf,
}

impl DocumentKind {
    /// Detect the kind from the file extension (case-insensitive).
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" => Some(Self::Image),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
        }
    }
}

// ── Field specs ─────────────────────────────────────────────────────

/// How a field's value is checked beyond presence and pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Date,
}

/// One field the extraction prompt asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// JSON key in the extracted record.
    pub key: String,
    /// Human description shown to the model.
    pub description: String,
    /// Example value used in the prompt's sample object.
    pub example: String,
    /// Regex the value must fully match, if any.
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

impl FieldSpec {
    pub fn text(key: &str, description: &str, example: &str) -> Self {
        Self {
            key: key.to_string(),
            description: description.to_string(),
            example: example.to_string(),
            pattern: None,
            kind: FieldKind::Text,
            required: true,
        }
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }
}

/// The identity-card field set: holder name, PAN number, and date of birth.
pub fn default_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::text("Name", "Name", "John Doe"),
        FieldSpec::text("PAN", "PAN Number", "ABCDE1234F").with_pattern("^[A-Z]{5}[0-9]{4}[A-Z]$"),
        FieldSpec::text("DOB", "Date of Birth (DOB)", "01/01/1990").with_kind(FieldKind::Date),
    ]
}

// ── Validation issues ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A problem found by rule validation on a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level}: {}: {}", self.field, self.message)
    }
}

// ── Stage errors ────────────────────────────────────────────────────

/// A non-fatal failure recorded by the pipeline for one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageError {
    /// Stage name: `ocr`, `extract`, or `validate`.
    pub stage: String,
    pub message: String,
    /// Raw model reply, when the failure was a parse of one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}
