// Docsift MCP server: exposes document extraction as MCP tools for AI agents.
//
// Tools:
//   docsift_extract  OCR + LLM extraction (+ validation) for one document
//   docsift_ocr      OCR text only, no LLM calls

use std::path::Path;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{ServerHandler, ServiceExt, schemars, tool, tool_router};
use serde::Deserialize;
use tracing::info;

use docsift_core::config::DocsiftConfig;
use docsift_core::extract::json::to_pretty_json;
use docsift_core::llm::LlmProvider;
use docsift_core::ocr::OcrEngine;
use docsift_core::ocr::tesseract::TesseractEngine;
use docsift_core::pipeline::{DocsiftPipeline, ocr_document};

// ── Tool parameter types ──────────────────────────────────────────

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExtractParams {
    /// Path to a .png, .jpg, .jpeg, or .pdf document
    #[schemars(description = "Path to a .png, .jpg, .jpeg, or .pdf document")]
    pub path: String,
    /// Run the validator agent after extraction (default: true)
    #[schemars(description = "Run the validator agent after extraction (default: true)")]
    pub validate: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct OcrParams {
    /// Path to a .png, .jpg, .jpeg, or .pdf document
    #[schemars(description = "Path to a .png, .jpg, .jpeg, or .pdf document")]
    pub path: String,
}

// ── Server struct ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DocsiftMcpServer {
    ocr: Arc<dyn OcrEngine>,
    validating: Arc<DocsiftPipeline>,
    extracting: Arc<DocsiftPipeline>,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

impl DocsiftMcpServer {
    /// Create a server using Tesseract for OCR.
    pub fn new(config: &DocsiftConfig, provider: Arc<dyn LlmProvider>) -> Result<Self, String> {
        let ocr: Arc<dyn OcrEngine> = Arc::new(TesseractEngine::from_config(&config.ocr));
        Self::with_engine(ocr, provider, config)
    }

    /// Create from an explicit OCR engine (for testing).
    pub fn with_engine(
        ocr: Arc<dyn OcrEngine>,
        provider: Arc<dyn LlmProvider>,
        config: &DocsiftConfig,
    ) -> Result<Self, String> {
        let build = || {
            DocsiftPipeline::new(Arc::clone(&ocr), Arc::clone(&provider), config)
                .map_err(|e| format!("Failed to build pipeline: {e}"))
        };
        let validating = build()?;
        let extracting = build()?.without_validation();
        Ok(Self {
            ocr,
            validating: Arc::new(validating),
            extracting: Arc::new(extracting),
            tool_router: Self::tool_router(),
        })
    }
}

// ── Tool implementations ──────────────────────────────────────────

#[tool_router]
impl DocsiftMcpServer {
    #[tool(
        name = "docsift_extract",
        description = "Extract structured fields (name, PAN number, date of birth) from a scanned document. Runs OCR, LLM extraction, and optional LLM validation. Returns the record plus rule-check issues."
    )]
    async fn extract(&self, Parameters(params): Parameters<ExtractParams>) -> String {
        match self.do_extract(params).await {
            Ok(s) => s,
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(
        name = "docsift_ocr",
        description = "Read the raw OCR text of a scanned image or PDF without calling an LLM."
    )]
    async fn ocr(&self, Parameters(params): Parameters<OcrParams>) -> String {
        match self.do_ocr(params).await {
            Ok(s) => s,
            Err(e) => format!("Error: {e}"),
        }
    }
}

impl ServerHandler for DocsiftMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Docsift MCP server. Document extraction tools for AI agents. \
                 Use docsift_extract to pull validated fields out of a scanned document \
                 and docsift_ocr to read its raw text."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ── Tool logic (separated for testability) ────────────────────────

impl DocsiftMcpServer {
    async fn do_extract(&self, params: ExtractParams) -> Result<String, String> {
        let pipeline = if params.validate.unwrap_or(true) {
            &self.validating
        } else {
            &self.extracting
        };
        let result = pipeline.run(Path::new(&params.path)).await;
        if result.is_input_error() {
            let message = result
                .errors
                .first()
                .map_or_else(String::new, |e| e.message.clone());
            return Err(message);
        }

        let response = serde_json::json!({
            "source": params.path,
            "result": result.final_output(),
            "corrected": result.corrected,
            "issues": result.issues,
        });
        Ok(to_pretty_json(&response))
    }

    async fn do_ocr(&self, params: OcrParams) -> Result<String, String> {
        ocr_document(&*self.ocr, Path::new(&params.path))
            .await
            .map_err(|e| e.to_string())
    }
}

/// Start the MCP server on stdio transport.
pub async fn serve_stdio(
    config: DocsiftConfig,
    provider: Arc<dyn LlmProvider>,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = DocsiftMcpServer::new(&config, provider)?;
    info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        "Starting docsift MCP server (stdio transport)"
    );

    let transport = tokio::io::join(tokio::io::stdin(), tokio::io::stdout());
    let service = server.serve(transport).await?;
    service.waiting().await?;

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────
