// Pipeline orchestrator: OCR → structured extraction → validation, with
// per-stage error capture so one bad document never aborts a batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::DocsiftConfig;
use crate::error::{DocsiftError, InputError};
use crate::extract::StructuredExtractor;
use crate::llm::cache::ResponseCache;
use crate::llm::{CostTracker, LlmProvider};
use crate::ocr::{OcrEngine, extract_text};
use crate::progress::{NoopReporter, ProgressReporter, Stage};
use crate::types::{DocumentKind, ExtractedRecord, Severity, StageError, ValidationIssue};
use crate::validate::{FieldRules, ValidatorAgent};

/// Everything learned about one document.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub source: PathBuf,
    pub kind: Option<DocumentKind>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<ExtractedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validated: Option<ExtractedRecord>,
    /// The validator agent changed the extracted record.
    pub corrected: bool,
    /// Why the validator agent did not run, when it was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_skipped: Option<String>,
    pub issues: Vec<ValidationIssue>,
    pub usage: CostTracker,
    pub errors: Vec<StageError>,
}

impl PipelineResult {
    fn new(source: &Path) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source: source.to_path_buf(),
            kind: None,
            started_at: Utc::now(),
            duration: Duration::ZERO,
            raw_text: None,
            extracted: None,
            validated: None,
            corrected: false,
            validation_skipped: None,
            issues: Vec::new(),
            usage: CostTracker::default(),
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, stage: Stage, message: String, raw_response: Option<String>) {
        warn!(source = %self.source.display(), stage = stage.as_str(), error = %message, "Stage failed");
        self.errors.push(StageError {
            stage: stage.as_str().to_string(),
            message,
            raw_response,
        });
    }

    fn fail_input(&mut self, message: &str) {
        warn!(source = %self.source.display(), reason = message, "Input rejected");
        self.errors.push(StageError {
            stage: "input".to_string(),
            message: message.to_string(),
            raw_response: None,
        });
    }

    /// No stage failed.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// The input itself was rejected (missing or unsupported file).
    pub fn is_input_error(&self) -> bool {
        self.errors.iter().any(|e| e.stage == "input")
    }

    /// Rule validation found at least one error-level issue.
    pub fn has_rule_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// The best record available: validated, else extracted.
    pub fn record(&self) -> Option<&ExtractedRecord> {
        self.validated.as_ref().or(self.extracted.as_ref())
    }

    /// The JSON object printed as the document's final result: the record,
    /// or `{"error": ...}` (plus `raw_response` when there is one).
    pub fn final_output(&self) -> serde_json::Value {
        if let Some(err) = self.errors.last() {
            if self.validated.is_none() {
                let mut obj = serde_json::Map::new();
                obj.insert("error".into(), err.message.clone().into());
                if let Some(raw) = &err.raw_response {
                    obj.insert("raw_response".into(), raw.clone().into());
                }
                return serde_json::Value::Object(obj);
            }
        }
        match self.record() {
            Some(record) => serde_json::Value::Object(record.clone()),
            None => serde_json::json!({ "error": "No data extracted" }),
        }
    }
}

/// Render a stage error the way it appears in the final output.
fn stage_message(provider: &dyn LlmProvider, err: &DocsiftError) -> String {
    match err {
        DocsiftError::Extract(e) => e.to_string(),
        DocsiftError::Llm(e) => format!("{} API error: {e}", provider.display_name()),
        DocsiftError::Ocr(e) => e.to_string(),
        DocsiftError::Validate(e) => e.to_string(),
        other => other.to_string(),
    }
}

/// Orchestrates OCR, extraction, and validation for documents.
#[derive(Debug)]
pub struct DocsiftPipeline {
    ocr: Arc<dyn OcrEngine>,
    provider: Arc<dyn LlmProvider>,
    extractor: StructuredExtractor,
    rules: FieldRules,
    agent: Option<ValidatorAgent>,
    cost_budget: f64,
    max_concurrent: usize,
}

impl DocsiftPipeline {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        provider: Arc<dyn LlmProvider>,
        config: &DocsiftConfig,
    ) -> crate::error::Result<Self> {
        config.check()?;
        let extractor =
            StructuredExtractor::new(Arc::clone(&provider), config.extraction.fields.clone())
                .with_template_version(config.extraction.template_version.clone())
                .with_temperature(config.llm.temperature)
                .with_cache(ResponseCache::new(config.llm.cache_dir.clone()));
        let rules = FieldRules::new(extractor.fields())?;

        let agent = config.validation.enabled.then(|| {
            ValidatorAgent::new(Arc::clone(&provider), &config.validation)
                .with_temperature(config.llm.temperature)
        });

        Ok(Self {
            ocr,
            provider,
            extractor,
            rules,
            agent,
            cost_budget: config.llm.cost_budget,
            max_concurrent: config.llm.max_concurrent.max(1) as usize,
        })
    }

    /// Disable the validator agent; rule checks still run.
    #[must_use]
    pub fn without_validation(mut self) -> Self {
        self.agent = None;
        self
    }

    pub fn validates(&self) -> bool {
        self.agent.is_some()
    }

    pub async fn run(&self, path: &Path) -> PipelineResult {
        self.run_with_progress(path, &NoopReporter).await
    }

    #[instrument(skip_all, name = "pipeline", fields(source = %path.display()))]
    pub async fn run_with_progress(
        &self,
        path: &Path,
        progress: &dyn ProgressReporter,
    ) -> PipelineResult {
        let start = Instant::now();
        let mut result = PipelineResult::new(path);
        let source = path.display().to_string();

        self.run_stages(path, &source, progress, &mut result).await;

        result.duration = start.elapsed();
        progress.document_finished(&source, result.is_success());
        info!(
            ok = result.is_success(),
            issues = result.issues.len(),
            requests = result.usage.total_requests,
            cost_usd = result.usage.estimated_cost_usd,
            duration = ?result.duration,
            "Document processed"
        );
        result
    }

    async fn run_stages(
        &self,
        path: &Path,
        source: &str,
        progress: &dyn ProgressReporter,
        result: &mut PipelineResult,
    ) {
        let kind = match check_input(path) {
            Ok(kind) => kind,
            Err(InputError::NotFound(_)) => {
                result.fail_input("File not found!");
                return;
            }
            Err(InputError::UnsupportedFormat(_)) => {
                result.fail_input("Unsupported file format!");
                return;
            }
        };
        result.kind = Some(kind);

        // OCR
        progress.stage(source, Stage::Ocr);
        let raw_text = match extract_text(&*self.ocr, path, kind).await {
            Ok(text) => text,
            Err(e) => {
                result.fail(Stage::Ocr, e.to_string(), None);
                return;
            }
        };
        debug!(chars = raw_text.len(), engine = self.ocr.name(), raw_text = %raw_text, "Extracted raw text");
        result.raw_text = Some(raw_text.clone());

        // Structured extraction
        progress.stage(source, Stage::Extract);
        let extracted = match self.extractor.extract(&raw_text).await {
            Ok(extraction) => {
                result.usage.merge(&extraction.usage);
                extraction.record
            }
            Err(e) => {
                result.fail(Stage::Extract, stage_message(&*self.provider, &e), None);
                return;
            }
        };
        result.extracted = Some(extracted.clone());

        // Validator agent
        if let Some(agent) = &self.agent {
            if result.usage.is_over_budget(self.cost_budget) {
                let reason = format!(
                    "cost budget ${:.4} reached (spent ${:.4})",
                    self.cost_budget, result.usage.estimated_cost_usd
                );
                warn!(%reason, "Skipping validator agent");
                progress.message(&format!("{source}: validation skipped, {reason}"));
                result.validation_skipped = Some(reason);
            } else {
                progress.stage(source, Stage::Validate);
                match agent.validate(&extracted).await {
                    Ok(verdict) => {
                        result.usage.merge(&verdict.usage);
                        result.corrected = verdict.corrected;
                        result.validated = Some(verdict.record);
                    }
                    Err(failure) => {
                        result.usage.merge(&failure.usage);
                        let raw = failure.error.raw_response().map(str::to_string);
                        result.fail(Stage::Validate, failure.error.to_string(), raw);
                    }
                }
            }
        } else {
            result.validation_skipped = Some("validation disabled".to_string());
        }

        // Rule checks on whichever record survived
        if let Some(record) = result.record() {
            let issues = self.rules.check(record);
            for issue in &issues {
                debug!(%issue, "Rule check");
            }
            result.issues = issues;
        }
    }

    /// Process many documents, at most `llm.max_concurrent` at a time.
    /// Results come back in input order.
    pub async fn run_batch(
        self: Arc<Self>,
        paths: Vec<PathBuf>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Vec<PipelineResult> {
        progress.batch_started(paths.len() as u64);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();

        for (index, path) in paths.iter().cloned().enumerate() {
            let pipeline = Arc::clone(&self);
            let progress = Arc::clone(&progress);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (index, pipeline.run_with_progress(&path, &*progress).await)
            });
        }

        let mut slots: Vec<Option<PipelineResult>> = vec![None; paths.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!(error = %e, "Document task failed to complete"),
            }
        }
        progress.finish();

        slots
            .into_iter()
            .zip(&paths)
            .map(|(slot, path)| {
                slot.unwrap_or_else(|| {
                    let mut lost = PipelineResult::new(path);
                    lost.fail_input("Processing was interrupted");
                    lost
                })
            })
            .collect()
    }
}

/// Input checks plus OCR, without any LLM call.
pub async fn ocr_document(engine: &dyn OcrEngine, path: &Path) -> crate::error::Result<String> {
    let kind = check_input(path)?;
    Ok(extract_text(engine, path, kind).await?)
}

/// Confirm the file exists and has a supported extension.
pub fn check_input(path: &Path) -> Result<DocumentKind, InputError> {
    if !path.exists() {
        return Err(InputError::NotFound(path.display().to_string()));
    }
    DocumentKind::detect(path).ok_or_else(|| InputError::UnsupportedFormat(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_input_rejects_missing_and_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.png");
        assert!(matches!(check_input(&missing), Err(InputError::NotFound(_))));

        let txt = tmp.path().join("notes.txt");
        std::fs::write(&txt, "x").unwrap();
        assert!(matches!(
            check_input(&txt),
            Err(InputError::UnsupportedFormat(_))
        ));

        let pdf = tmp.path().join("scan.PDF");
        std::fs::write(&pdf, "x").unwrap();
        assert_eq!(check_input(&pdf).unwrap(), DocumentKind::Pdf);
    }

    #[test]
    fn final_output_prefers_error_without_validated_record() {
        let mut result = PipelineResult::new(Path::new("a.png"));
        result.fail_input("File not found!");
        assert_eq!(
            result.final_output(),
            serde_json::json!({ "error": "File not found!" })
        );
        assert!(result.is_input_error());
    }

    #[test]
    fn final_output_carries_raw_response() {
        let mut result = PipelineResult::new(Path::new("a.png"));
        let mut record = ExtractedRecord::new();
        record.insert("Name".into(), "A".into());
        result.extracted = Some(record);
        result.fail(
            Stage::Validate,
            "Invalid JSON response: expected value".into(),
            Some("Looks fine".into()),
        );
        let out = result.final_output();
        assert_eq!(out["error"], "Invalid JSON response: expected value");
        assert_eq!(out["raw_response"], "Looks fine");
    }

    #[test]
    fn final_output_is_validated_record() {
        let mut result = PipelineResult::new(Path::new("a.png"));
        let mut extracted = ExtractedRecord::new();
        extracted.insert("Name".into(), "a".into());
        let mut validated = ExtractedRecord::new();
        validated.insert("Name".into(), "A".into());
        result.extracted = Some(extracted);
        result.validated = Some(validated);
        assert_eq!(result.final_output(), serde_json::json!({ "Name": "A" }));
        assert!(result.is_success());
    }

    #[test]
    fn result_serializes_for_reports() {
        let result = PipelineResult::new(Path::new("a.png"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["source"], "a.png");
        assert!(json.get("raw_text").is_none());
        assert_eq!(json["errors"], serde_json::json!([]));
    }
}
