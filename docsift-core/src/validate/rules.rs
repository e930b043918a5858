// Deterministic field checks: presence, pattern, and date shape.

use chrono::NaiveDate;
use regex::Regex;

use crate::error::ConfigError;
use crate::types::{ExtractedRecord, FieldKind, FieldSpec, Severity, ValidationIssue};

/// Date layouts accepted for `FieldKind::Date` values.
pub const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%d.%m.%Y"];

/// Field specs with their patterns compiled.
#[derive(Debug, Clone)]
pub struct FieldRules {
    rules: Vec<(FieldSpec, Option<Regex>)>,
}

impl FieldRules {
    pub fn new(fields: &[FieldSpec]) -> Result<Self, ConfigError> {
        let rules = fields
            .iter()
            .map(|spec| {
                let pattern = spec
                    .pattern
                    .as_deref()
                    .map(Regex::new)
                    .transpose()
                    .map_err(|e| {
                        ConfigError::Invalid(format!("bad pattern for field {}: {e}", spec.key))
                    })?;
                Ok((spec.clone(), pattern))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { rules })
    }

    /// Check a record against every rule. Issues come back in field order,
    /// followed by warnings for keys no rule knows about.
    pub fn check(&self, record: &ExtractedRecord) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for (spec, pattern) in &self.rules {
            let value = record.get(&spec.key).and_then(scalar_text);
            let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
                if record.get(&spec.key).is_some_and(is_compound) {
                    issues.push(issue(spec, "expected a single value", Severity::Error));
                } else if spec.required {
                    issues.push(issue(spec, "missing", Severity::Error));
                }
                continue;
            };
            let value = value.trim();

            if let Some(re) = pattern {
                if !re.is_match(value) {
                    issues.push(issue(
                        spec,
                        &format!("value {value:?} does not match pattern {}", re.as_str()),
                        Severity::Error,
                    ));
                }
            }

            if spec.kind == FieldKind::Date && parse_date(value).is_none() {
                issues.push(issue(
                    spec,
                    &format!("value {value:?} is not a recognized date"),
                    Severity::Warning,
                ));
            }
        }

        for key in record.keys() {
            if !self.rules.iter().any(|(spec, _)| &spec.key == key) {
                issues.push(ValidationIssue {
                    field: key.clone(),
                    message: "unexpected field".into(),
                    severity: Severity::Warning,
                });
            }
        }

        issues
    }
}

fn issue(spec: &FieldSpec, message: &str, severity: Severity) -> ValidationIssue {
    ValidationIssue {
        field: spec.key.clone(),
        message: message.to_string(),
        severity,
    }
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_compound(value: &serde_json::Value) -> bool {
    value.is_array() || value.is_object()
}

/// Parse a date in any of [`DATE_FORMATS`].
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}
