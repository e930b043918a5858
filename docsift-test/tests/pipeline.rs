use std::sync::{Arc, Mutex};

use docsift_core::config::DocsiftConfig;
use docsift_core::llm::Role;
use docsift_core::pipeline::ocr_document;
use docsift_core::progress::{NoopReporter, ProgressReporter, Stage};
use docsift_core::types::{DocumentKind, Severity};
use docsift_test::{
    CannedOcr, DocFixture, PAN_CARD_REPLY, PAN_CARD_TEXT, PAN_CARD_VALIDATED, ScriptedProvider,
    cached_config, pipeline,
};
use serde_json::json;

fn pan_card_record() -> serde_json::Value {
    json!({ "Name": "RAVI KUMAR", "PAN": "ABCDE1234F", "DOB": "15/08/1985" })
}

// ── Happy paths ──────────────────────────────────────────────────

#[tokio::test]
async fn image_runs_all_stages() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let ocr = CannedOcr::new(PAN_CARD_TEXT);
    let llm = ScriptedProvider::new([PAN_CARD_REPLY, PAN_CARD_VALIDATED]);

    let result = pipeline(ocr.clone(), llm.clone(), &DocsiftConfig::default())
        .run(&scan)
        .await;

    assert!(result.is_success(), "errors: {:?}", result.errors);
    assert_eq!(result.kind, Some(DocumentKind::Image));
    assert_eq!(result.raw_text.as_deref(), Some(PAN_CARD_TEXT));
    assert_eq!(result.final_output(), pan_card_record());
    assert!(!result.corrected);
    assert!(result.issues.is_empty(), "issues: {:?}", result.issues);
    assert_eq!(result.usage.total_requests, 2);
    assert_eq!(ocr.call_count(), 1);

    let conversations = llm.conversations();
    assert_eq!(conversations.len(), 2);

    // Extraction: a single user prompt carrying the OCR text
    let prompt = &conversations[0][0];
    assert_eq!(prompt.role, Role::User);
    assert!(prompt.content.contains("Raw Text:\nINCOME TAX DEPARTMENT"));
    assert!(prompt.content.contains("- PAN Number"));

    // Validation: system message, then the record with 4-space indent
    assert_eq!(conversations[1][0].role, Role::System);
    assert!(conversations[1][1].content.contains("    \"PAN\": \"ABCDE1234F\""));
}

#[tokio::test]
async fn pdf_is_detected_and_processed() {
    let docs = DocFixture::new();
    let scan = docs.touch("statement.PDF");
    let llm = ScriptedProvider::new([PAN_CARD_REPLY, PAN_CARD_VALIDATED]);

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm, &DocsiftConfig::default())
        .run(&scan)
        .await;

    assert_eq!(result.kind, Some(DocumentKind::Pdf));
    assert_eq!(result.final_output(), pan_card_record());
}

#[tokio::test]
async fn validator_corrections_win() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.jpg");
    let llm = ScriptedProvider::new([
        PAN_CARD_REPLY,
        "{\"Name\": \"Ravi Kumar\", \"PAN\": \"ABCDE1234F\", \"DOB\": \"15/08/1985\"}",
    ]);

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm, &DocsiftConfig::default())
        .run(&scan)
        .await;

    assert!(result.corrected);
    assert_eq!(result.final_output()["Name"], "Ravi Kumar");
    assert_eq!(result.extracted.as_ref().unwrap()["Name"], "RAVI KUMAR");
}

#[tokio::test]
async fn no_validate_returns_extracted_record() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::new([PAN_CARD_REPLY]);

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm.clone(), &DocsiftConfig::default())
        .without_validation()
        .run(&scan)
        .await;

    assert_eq!(result.final_output(), pan_card_record());
    assert_eq!(llm.call_count(), 1);
    assert_eq!(
        result.validation_skipped.as_deref(),
        Some("validation disabled")
    );
}

#[tokio::test]
async fn trailing_commas_are_repaired() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::new([
        "{\"Name\": \"RAVI KUMAR\", \"PAN\": \"ABCDE1234F\", \"DOB\": \"15/08/1985\",}",
    ]);

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm, &DocsiftConfig::default())
        .without_validation()
        .run(&scan)
        .await;

    assert_eq!(result.final_output(), pan_card_record());
}

// ── Input errors ─────────────────────────────────────────────────

#[tokio::test]
async fn missing_file_reports_not_found() {
    let docs = DocFixture::new();
    let ocr = CannedOcr::new(PAN_CARD_TEXT);
    let llm = ScriptedProvider::new([]);

    let result = pipeline(ocr.clone(), llm.clone(), &DocsiftConfig::default())
        .run(&docs.missing("gone.png"))
        .await;

    assert_eq!(result.final_output(), json!({ "error": "File not found!" }));
    assert!(result.is_input_error());
    assert_eq!(ocr.call_count(), 0);
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn unsupported_extension_reports_format() {
    let docs = DocFixture::new();
    let notes = docs.touch("notes.docx");

    let result = pipeline(
        CannedOcr::new(PAN_CARD_TEXT),
        ScriptedProvider::new([]),
        &DocsiftConfig::default(),
    )
    .run(&notes)
    .await;

    assert_eq!(
        result.final_output(),
        json!({ "error": "Unsupported file format!" })
    );
}

// ── Stage errors ─────────────────────────────────────────────────

#[tokio::test]
async fn missing_ocr_tool_stops_before_llm() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::new([PAN_CARD_REPLY]);

    let result = pipeline(
        CannedOcr::missing_tool("tesseract"),
        llm.clone(),
        &DocsiftConfig::default(),
    )
    .run(&scan)
    .await;

    assert_eq!(result.errors[0].stage, "ocr");
    assert_eq!(
        result.final_output(),
        json!({ "error": "OCR tool not available: tesseract" })
    );
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn empty_extraction_reply_skips_validator() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::new(["   "]);

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm.clone(), &DocsiftConfig::default())
        .run(&scan)
        .await;

    assert_eq!(
        result.final_output(),
        json!({ "error": "Gemini API returned an empty response" })
    );
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn prose_extraction_reply_is_invalid_format() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::new(["I could not find any details in this document."]);

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm, &DocsiftConfig::default())
        .run(&scan)
        .await;

    assert_eq!(
        result.final_output(),
        json!({ "error": "Gemini API returned invalid JSON format" })
    );
}

#[tokio::test]
async fn broken_json_is_malformed() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::new(["{\"Name\": \"RAVI KUMAR\" \"PAN\": }"]);

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm, &DocsiftConfig::default())
        .run(&scan)
        .await;

    assert_eq!(
        result.final_output(),
        json!({ "error": "Gemini API returned malformed JSON" })
    );
}

#[tokio::test]
async fn provider_failure_is_recorded() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::new([]);
    llm.push_error("quota exhausted");

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm, &DocsiftConfig::default())
        .run(&scan)
        .await;

    assert_eq!(result.errors[0].stage, "extract");
    let out = result.final_output();
    let message = out["error"].as_str().unwrap();
    assert!(message.starts_with("Gemini API error:"), "{message}");
    assert!(message.contains("quota exhausted"));
}

#[tokio::test]
async fn silent_validator_is_no_reply() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::new([PAN_CARD_REPLY, "", ""]);

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm.clone(), &DocsiftConfig::default())
        .run(&scan)
        .await;

    assert_eq!(
        result.final_output(),
        json!({ "error": "Assistant did not return a valid JSON response." })
    );
    // One extraction call plus two validator turns
    assert_eq!(llm.call_count(), 3);
    assert!(result.extracted.is_some());
}

#[tokio::test]
async fn prose_validator_reply_keeps_raw_response() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::new([PAN_CARD_REPLY, "Everything looks correct."]);

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm, &DocsiftConfig::default())
        .run(&scan)
        .await;

    let out = result.final_output();
    assert!(
        out["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid JSON response:")
    );
    assert_eq!(out["raw_response"], "Everything looks correct.");
}

#[tokio::test]
async fn terminating_validator_reply_is_parsed() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::new([PAN_CARD_REPLY]);
    llm.push_reply("TERMINATE");

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm.clone(), &DocsiftConfig::default())
        .run(&scan)
        .await;

    let out = result.final_output();
    assert!(
        out["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid JSON response:")
    );
    assert_eq!(out["raw_response"], "TERMINATE");
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn nudge_never_sends_an_empty_turn() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::new([PAN_CARD_REPLY, "", PAN_CARD_VALIDATED]);

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm.clone(), &DocsiftConfig::default())
        .run(&scan)
        .await;

    assert_eq!(result.final_output(), pan_card_record());
    let conversations = llm.conversations();
    assert_eq!(conversations.len(), 3);
    let nudge = &conversations[2];
    assert!(nudge.iter().all(|m| !m.content.is_empty()));
    assert!(nudge.iter().all(|m| m.role != Role::Assistant));
}

// ── Rules, budget, cache ─────────────────────────────────────────

#[tokio::test]
async fn rule_checks_flag_bad_values() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::new([
        "{\"Name\": \"RAVI KUMAR\", \"PAN\": \"ABCD1234F\", \"DOB\": \"August 1985\"}",
    ]);

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm, &DocsiftConfig::default())
        .without_validation()
        .run(&scan)
        .await;

    assert!(result.is_success());
    assert!(result.has_rule_errors());
    let pan = result.issues.iter().find(|i| i.field == "PAN").unwrap();
    assert_eq!(pan.severity, Severity::Error);
    let dob = result.issues.iter().find(|i| i.field == "DOB").unwrap();
    assert_eq!(dob.severity, Severity::Warning);
}

#[tokio::test]
async fn budget_exceeded_skips_validator() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::priced([PAN_CARD_REPLY, PAN_CARD_VALIDATED], 1.0);
    let mut config = DocsiftConfig::default();
    config.llm.cost_budget = 0.001;

    let result = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm.clone(), &config)
        .run(&scan)
        .await;

    assert_eq!(llm.call_count(), 1);
    assert!(result.validation_skipped.is_some());
    assert_eq!(result.final_output(), pan_card_record());
}

#[derive(Default)]
struct RecordingReporter {
    messages: Mutex<Vec<String>>,
}

impl ProgressReporter for RecordingReporter {
    fn batch_started(&self, _total: u64) {}
    fn stage(&self, _source: &str, _stage: Stage) {}
    fn document_finished(&self, _source: &str, _ok: bool) {}
    fn finish(&self) {}
    fn message(&self, msg: &str) {
        self.messages.lock().unwrap().push(msg.to_string());
    }
}

#[tokio::test]
async fn budget_skip_is_reported_to_progress() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let llm = ScriptedProvider::priced([PAN_CARD_REPLY], 1.0);
    let mut config = DocsiftConfig::default();
    config.llm.cost_budget = 0.001;
    let reporter = RecordingReporter::default();

    pipeline(CannedOcr::new(PAN_CARD_TEXT), llm, &config)
        .run_with_progress(&scan, &reporter)
        .await;

    let messages = reporter.messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("validation skipped"));
    assert!(messages[0].contains("pan.png"));
}

#[tokio::test]
async fn cached_extraction_skips_the_call() {
    let docs = DocFixture::new();
    let scan = docs.touch("pan.png");
    let config = cached_config(&docs);
    let llm = ScriptedProvider::new([PAN_CARD_REPLY, PAN_CARD_VALIDATED, PAN_CARD_VALIDATED]);
    let pipeline = pipeline(CannedOcr::new(PAN_CARD_TEXT), llm.clone(), &config);

    let first = pipeline.run(&scan).await;
    assert_eq!(first.usage.cache_hits, 0);

    let second = pipeline.run(&scan).await;
    assert_eq!(second.usage.cache_hits, 1);
    assert_eq!(second.final_output(), pan_card_record());
    // Second run only talked to the validator
    assert_eq!(llm.call_count(), 3);
}

// ── Batch ────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_keeps_input_order() {
    let docs = DocFixture::new();
    let paths = vec![
        docs.touch("a.png"),
        docs.missing("b.png"),
        docs.touch("c.pdf"),
        docs.touch("d.txt"),
    ];
    let llm = ScriptedProvider::new([PAN_CARD_REPLY, PAN_CARD_REPLY]);
    let mut config = DocsiftConfig::default();
    config.llm.max_concurrent = 2;

    let pipeline = Arc::new(
        pipeline(CannedOcr::new(PAN_CARD_TEXT), llm.clone(), &config).without_validation(),
    );
    let results = pipeline
        .run_batch(paths.clone(), Arc::new(NoopReporter))
        .await;

    assert_eq!(results.len(), 4);
    for (result, path) in results.iter().zip(&paths) {
        assert_eq!(&result.source, path);
    }
    assert_eq!(results[0].final_output(), pan_card_record());
    assert_eq!(results[1].final_output(), json!({ "error": "File not found!" }));
    assert_eq!(results[2].final_output(), pan_card_record());
    assert_eq!(
        results[3].final_output(),
        json!({ "error": "Unsupported file format!" })
    );
    assert_eq!(llm.call_count(), 2);
}

// ── OCR only ─────────────────────────────────────────────────────

#[tokio::test]
async fn ocr_document_checks_input_first() {
    let docs = DocFixture::new();
    let ocr = CannedOcr::new(PAN_CARD_TEXT);

    let text = ocr_document(&*ocr, &docs.touch("pan.jpeg")).await.unwrap();
    assert_eq!(text, PAN_CARD_TEXT);

    let err = ocr_document(&*ocr, &docs.missing("gone.png"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("File not found"));
    assert_eq!(ocr.call_count(), 1);
}
