// LLM provider implementations: Gemini, Anthropic, OpenAI, and custom HTTP endpoints.
#![allow(clippy::cast_precision_loss)]

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmSection;
use crate::error::{DocsiftError, LlmError};

use super::{ChatMessage, LlmProvider, Role, TokenUsage};

const DEFAULT_MAX_TOKENS: u32 = 1024;

fn network_error(e: &reqwest::Error) -> DocsiftError {
    DocsiftError::Llm(LlmError::Network(e.to_string()))
}

fn parse_error(e: &reqwest::Error) -> DocsiftError {
    DocsiftError::Llm(LlmError::Parse(e.to_string()))
}

/// Turn a non-2xx response into an `ApiError`, passing successes through.
async fn check_status(resp: reqwest::Response) -> crate::error::Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    Err(DocsiftError::Llm(LlmError::ApiError { status, body: text }))
}

/// Concatenate all system messages; providers with a dedicated system slot use this.
fn system_text(messages: &[ChatMessage]) -> Option<String> {
    let parts: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Non-system turns with empty turns dropped and adjacent same-role turns
/// merged. Gemini and Anthropic reject empty text parts and expect the
/// roles to alternate.
fn conversation_turns(messages: &[ChatMessage]) -> Vec<(Role, String)> {
    let mut turns: Vec<(Role, String)> = Vec::new();
    for m in messages {
        if m.role == Role::System || m.content.trim().is_empty() {
            continue;
        }
        match turns.last_mut() {
            Some((role, text)) if *role == m.role => {
                text.push_str("\n\n");
                text.push_str(&m.content);
            }
            _ => turns.push((m.role, m.content.clone())),
        }
    }
    turns
}

/// Shared HTTP client constructor. reqwest is built without a bundled
/// crypto provider, so aws-lc-rs is installed as the process default first.
fn http_client() -> Client {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    Client::new()
}

// ── Gemini Provider ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

fn gemini_contents(messages: &[ChatMessage]) -> Vec<GeminiContent> {
    conversation_turns(messages)
        .into_iter()
        .map(|(role, text)| GeminiContent {
            role: Some(
                match role {
                    Role::Assistant => "model",
                    _ => "user",
                }
                .to_string(),
            ),
            parts: vec![GeminiPart { text }],
        })
        .collect()
}

fn anthropic_messages(messages: &[ChatMessage]) -> Vec<RoleMessage> {
    conversation_turns(messages)
        .into_iter()
        .map(|(role, content)| RoleMessage {
            role: match role {
                Role::Assistant => "assistant",
                _ => "user",
            }
            .to_string(),
            content,
        })
        .collect()
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn display_name(&self) -> &str {
        "Gemini"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> crate::error::Result<(String, TokenUsage)> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let body = GeminiRequest {
            system_instruction: system_text(messages).map(|text| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text }],
            }),
            contents: gemini_contents(messages),
            generation_config: GeminiGenerationConfig {
                temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        debug!(model = %self.model, turns = body.contents.len(), "Calling Gemini API");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(&e))?;
        let resp = check_status(resp).await?;

        let result: GeminiResponse = resp.json().await.map_err(|e| parse_error(&e))?;

        let text = result
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default();

        let usage = result
            .usage_metadata
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok((text, usage))
    }

    fn cost_per_1k_input(&self) -> f64 {
        if self.model.contains("pro") {
            0.001_25
        } else if self.model.contains("lite") {
            0.000_075
        } else {
            // flash tier
            0.0001
        }
    }

    fn cost_per_1k_output(&self) -> f64 {
        if self.model.contains("pro") {
            0.01
        } else if self.model.contains("lite") {
            0.0003
        } else {
            0.0004
        }
    }
}

// ── Anthropic Provider ──────────────────────────────────────────────

#[derive(Debug)]
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model,
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<RoleMessage>,
}

/// `{role, content}` message shape shared by Anthropic and OpenAI.
#[derive(Serialize)]
struct RoleMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn display_name(&self) -> &str {
        "Anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> crate::error::Result<(String, TokenUsage)> {
        let url = format!("{}/v1/messages", self.base_url);

        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature,
            system: system_text(messages),
            messages: anthropic_messages(messages),
        };

        debug!(model = %self.model, "Calling Anthropic API");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(&e))?;
        let resp = check_status(resp).await?;

        let result: AnthropicResponse = resp.json().await.map_err(|e| parse_error(&e))?;

        let text = result
            .content
            .first()
            .map(|c| c.text.clone())
            .unwrap_or_default();

        Ok((
            text,
            TokenUsage {
                input_tokens: result.usage.input_tokens,
                output_tokens: result.usage.output_tokens,
            },
        ))
    }

    fn cost_per_1k_input(&self) -> f64 {
        if self.model.contains("opus") {
            0.015
        } else if self.model.contains("haiku") {
            0.000_25
        } else {
            0.003
        }
    }

    fn cost_per_1k_output(&self) -> f64 {
        if self.model.contains("opus") {
            0.075
        } else if self.model.contains("haiku") {
            0.001_25
        } else {
            0.015
        }
    }
}

// ── OpenAI Provider ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            model,
            base_url: "https://api.openai.com".to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<RoleMessage>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: OpenAiUsage,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn display_name(&self) -> &str {
        "OpenAI"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> crate::error::Result<(String, TokenUsage)> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = OpenAiRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature,
            messages: messages
                .iter()
                .filter(|m| !m.content.trim().is_empty())
                .map(|m| RoleMessage {
                    role: match m.role {
                        Role::System => "system",
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    }
                    .to_string(),
                    content: m.content.clone(),
                })
                .collect(),
        };

        debug!(model = %self.model, "Calling OpenAI API");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(&e))?;
        let resp = check_status(resp).await?;

        let result: OpenAiResponse = resp.json().await.map_err(|e| parse_error(&e))?;

        let text = result
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok((
            text,
            TokenUsage {
                input_tokens: result.usage.prompt_tokens,
                output_tokens: result.usage.completion_tokens,
            },
        ))
    }

    fn cost_per_1k_input(&self) -> f64 {
        if self.model.contains("gpt-4o") {
            0.0025
        } else if self.model.contains("gpt-4") {
            0.03
        } else {
            0.0015
        }
    }

    fn cost_per_1k_output(&self) -> f64 {
        if self.model.contains("gpt-4o") {
            0.01
        } else if self.model.contains("gpt-4") {
            0.06
        } else {
            0.002
        }
    }
}

// ── Provider Factory ────────────────────────────────────────────────

/// Create an LLM provider from explicit settings.
pub fn create_provider(
    provider: &str,
    model: &str,
    api_key: &str,
    base_url: Option<&str>,
) -> crate::error::Result<Box<dyn LlmProvider>> {
    create_provider_with_limits(provider, model, api_key, base_url, DEFAULT_MAX_TOKENS)
}

/// Create an LLM provider from the `[llm]` config section.
pub fn provider_from_config(
    section: &LlmSection,
    api_key: &str,
) -> crate::error::Result<Box<dyn LlmProvider>> {
    create_provider_with_limits(
        &section.provider,
        &section.model,
        api_key,
        section.base_url.as_deref(),
        section.max_tokens,
    )
}

fn create_provider_with_limits(
    provider: &str,
    model: &str,
    api_key: &str,
    base_url: Option<&str>,
    max_tokens: u32,
) -> crate::error::Result<Box<dyn LlmProvider>> {
    if api_key.trim().is_empty() {
        return Err(DocsiftError::Llm(LlmError::Config(format!(
            "api_key not set for provider {provider}"
        ))));
    }
    match provider {
        "gemini" => {
            let mut p = GeminiProvider::new(api_key.to_string(), model.to_string())
                .with_max_tokens(max_tokens);
            if let Some(url) = base_url {
                p = p.with_base_url(url.to_string());
            }
            Ok(Box::new(p))
        }
        "anthropic" => {
            let mut p = AnthropicProvider::new(api_key.to_string(), model.to_string())
                .with_max_tokens(max_tokens);
            if let Some(url) = base_url {
                p = p.with_base_url(url.to_string());
            }
            Ok(Box::new(p))
        }
        "openai" | "custom" => {
            let mut p = OpenAiProvider::new(api_key.to_string(), model.to_string())
                .with_max_tokens(max_tokens);
            if let Some(url) = base_url {
                p = p.with_base_url(url.to_string());
            }
            Ok(Box::new(p))
        }
        other => Err(DocsiftError::Llm(LlmError::Config(format!(
            "Unknown provider: {other}. Use: gemini, anthropic, openai, custom"
        )))),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
