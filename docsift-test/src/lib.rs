// Integration test utilities and fixtures for docsift: a scripted LLM
// provider, a canned OCR engine, and a temporary document directory.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docsift_core::config::DocsiftConfig;
use docsift_core::error::{DocsiftError, LlmError, OcrError};
use docsift_core::llm::{ChatMessage, LlmProvider, TokenUsage};
use docsift_core::ocr::OcrEngine;
use docsift_core::pipeline::DocsiftPipeline;

/// OCR text of a typical PAN card scan.
pub const PAN_CARD_TEXT: &str = "INCOME TAX DEPARTMENT\nGOVT. OF INDIA\n\
RAVI KUMAR\nSURESH KUMAR\n15/08/1985\nPermanent Account Number\nABCDE1234F\nSignature";

/// A well-formed extraction reply for [`PAN_CARD_TEXT`], fenced the way
/// chat models tend to answer.
pub const PAN_CARD_REPLY: &str = "```json\n{\n    \"Name\": \"RAVI KUMAR\",\n    \"PAN\": \"ABCDE1234F\",\n    \"DOB\": \"15/08/1985\"\n}\n```";

/// The validator's answer for an unchanged [`PAN_CARD_REPLY`] record.
pub const PAN_CARD_VALIDATED: &str =
    "{\"Name\": \"RAVI KUMAR\", \"PAN\": \"ABCDE1234F\", \"DOB\": \"15/08/1985\"}";

// ── Scripted LLM ──────────────────────────────────────────────────

/// An LLM provider that replays queued replies and records every
/// conversation it is sent. An exhausted queue answers with an empty string.
#[derive(Debug)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    conversations: Mutex<Vec<Vec<ChatMessage>>>,
    cost_per_1k: f64,
}

impl ScriptedProvider {
    pub fn new<'a>(replies: impl IntoIterator<Item = &'a str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            conversations: Mutex::default(),
            cost_per_1k: 0.0,
        })
    }

    /// Same as [`ScriptedProvider::new`] but every 1K tokens costs `usd`.
    pub fn priced<'a>(replies: impl IntoIterator<Item = &'a str>, usd: f64) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            conversations: Mutex::default(),
            cost_per_1k: usd,
        })
    }

    /// Queue an API failure (HTTP 500 with `body`).
    pub fn push_error(&self, body: &str) {
        self.replies.lock().unwrap().push_back(Err(body.to_string()));
    }

    /// Queue a reply after the ones given at construction.
    pub fn push_reply(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    /// Every conversation sent so far, in call order.
    pub fn conversations(&self) -> Vec<Vec<ChatMessage>> {
        self.conversations.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn display_name(&self) -> &str {
        "Gemini"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        _temperature: f64,
    ) -> docsift_core::error::Result<(String, TokenUsage)> {
        self.conversations.lock().unwrap().push(messages.to_vec());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Err(body)) => Err(DocsiftError::Llm(LlmError::ApiError { status: 500, body })),
            Some(Ok(reply)) => {
                let input: usize = messages.iter().map(|m| m.content.len()).sum();
                let usage = TokenUsage {
                    input_tokens: (input / 4) as u64,
                    output_tokens: (reply.len() / 4) as u64,
                };
                Ok((reply, usage))
            }
            None => Ok((String::new(), TokenUsage::default())),
        }
    }

    fn cost_per_1k_input(&self) -> f64 {
        self.cost_per_1k
    }

    fn cost_per_1k_output(&self) -> f64 {
        self.cost_per_1k
    }
}

// ── Canned OCR ────────────────────────────────────────────────────

/// An OCR engine that returns fixed text for every document, or a fixed
/// failure.
#[derive(Debug)]
pub struct CannedOcr {
    text: Result<String, String>,
    calls: AtomicUsize,
}

impl CannedOcr {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Every recognition fails as if the tool were not installed.
    pub fn missing_tool(tool: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Err(tool.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text.clone().map_err(OcrError::ToolMissing)
    }
}

#[async_trait]
impl OcrEngine for CannedOcr {
    fn name(&self) -> &str {
        "canned"
    }

    async fn recognize_image(&self, _path: &Path) -> Result<String, OcrError> {
        self.answer()
    }

    async fn recognize_pdf(&self, _path: &Path) -> Result<String, OcrError> {
        self.answer()
    }
}

// ── Document fixtures ─────────────────────────────────────────────

/// A temporary directory of placeholder document files.
#[derive(Debug)]
pub struct DocFixture {
    pub dir: tempfile::TempDir,
}

impl Default for DocFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl DocFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create an empty file named `name` and return its path. The canned OCR
    /// engine never reads it, so only the extension matters.
    pub fn touch(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"").unwrap();
        path
    }

    /// A path inside the fixture that does not exist.
    pub fn missing(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Default config with the response cache pointed inside `fixture`.
pub fn cached_config(fixture: &DocFixture) -> DocsiftConfig {
    let mut config = DocsiftConfig::default();
    config.llm.cache_dir = Some(fixture.path().join("cache"));
    config
}

/// Build a pipeline from fakes and a config.
pub fn pipeline(
    ocr: Arc<dyn OcrEngine>,
    provider: Arc<dyn LlmProvider>,
    config: &DocsiftConfig,
) -> DocsiftPipeline {
    DocsiftPipeline::new(ocr, provider, config).expect("pipeline from valid config")
}
