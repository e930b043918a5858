pub mod cache;
pub mod providers;

use serde::{Deserialize, Serialize};

/// Token usage from an LLM call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Tracks cumulative LLM costs across a pipeline run.
#[allow(clippy::cast_precision_loss)]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostTracker {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_requests: u64,
    pub estimated_cost_usd: f64,
    pub cache_hits: u64,
}

#[allow(clippy::cast_precision_loss)]
impl CostTracker {
    pub fn record_call(
        &mut self,
        usage: &TokenUsage,
        cost_per_1k_input: f64,
        cost_per_1k_output: f64,
    ) {
        self.total_input_tokens += usage.input_tokens;
        self.total_output_tokens += usage.output_tokens;
        self.total_requests += 1;
        self.estimated_cost_usd += (usage.input_tokens as f64 / 1000.0) * cost_per_1k_input
            + (usage.output_tokens as f64 / 1000.0) * cost_per_1k_output;
    }

    /// Record a call against the provider's own price list.
    pub fn record_provider_call(&mut self, provider: &dyn LlmProvider, usage: &TokenUsage) {
        self.record_call(
            usage,
            provider.cost_per_1k_input(),
            provider.cost_per_1k_output(),
        );
    }

    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn is_over_budget(&self, budget: f64) -> bool {
        budget > 0.0 && self.estimated_cost_usd >= budget
    }

    /// Fold another tracker's totals into this one.
    pub fn merge(&mut self, other: &CostTracker) {
        self.total_input_tokens += other.total_input_tokens;
        self.total_output_tokens += other.total_output_tokens;
        self.total_requests += other.total_requests;
        self.estimated_cost_usd += other.estimated_cost_usd;
        self.cache_hits += other.cache_hits;
    }
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn in a conversation sent to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Common interface for LLM providers.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync + std::fmt::Debug {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Name used in user-facing error messages ("Gemini API returned ...").
    fn display_name(&self) -> &str {
        self.name()
    }

    /// The model ID being used.
    fn model_id(&self) -> &str;

    /// Send a conversation and return the assistant's reply + token usage.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> crate::error::Result<(String, TokenUsage)>;

    /// Call the LLM with a single user prompt.
    async fn call(
        &self,
        prompt: &str,
        temperature: f64,
    ) -> crate::error::Result<(String, TokenUsage)> {
        self.chat(&[ChatMessage::user(prompt)], temperature).await
    }

    /// Cost per 1K input tokens (USD).
    fn cost_per_1k_input(&self) -> f64;

    /// Cost per 1K output tokens (USD).
    fn cost_per_1k_output(&self) -> f64;
}

// ── Tests ───────────────────────────────────────────────────────────
