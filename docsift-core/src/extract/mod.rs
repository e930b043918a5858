//! Structured extraction: raw OCR text in, one JSON record out.

pub mod json;
pub mod prompt;

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::{DocsiftError, ExtractError};
use crate::llm::cache::{ResponseCache, compute_input_hash};
use crate::llm::{ChatMessage, CostTracker, LlmProvider};
use crate::types::{ExtractedRecord, FieldSpec};

use self::json::{JsonRecovery, recover_object};
use self::prompt::build_extraction_prompt;

/// A successful extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: ExtractedRecord,
    /// The model reply the record was recovered from.
    pub raw_response: String,
    pub usage: CostTracker,
}

/// Asks an LLM for the configured fields and recovers the JSON it returns.
#[derive(Debug, Clone)]
pub struct StructuredExtractor {
    provider: Arc<dyn LlmProvider>,
    fields: Vec<FieldSpec>,
    template_version: String,
    temperature: f64,
    cache: ResponseCache,
}

impl StructuredExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>, fields: Vec<FieldSpec>) -> Self {
        Self {
            provider,
            fields,
            template_version: "extract-v1".to_string(),
            temperature: 0.0,
            cache: ResponseCache::disabled(),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_template_version(mut self, version: impl Into<String>) -> Self {
        self.template_version = version.into();
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    #[instrument(skip_all, name = "structured_extract", fields(chars = raw_text.len()))]
    pub async fn extract(&self, raw_text: &str) -> crate::error::Result<Extraction> {
        let messages = [ChatMessage::user(build_extraction_prompt(
            &self.fields,
            raw_text,
        ))];
        let model_id = self.provider.model_id();
        let input_hash = compute_input_hash(model_id, &self.template_version, &messages);
        let mut usage = CostTracker::default();

        let (reply, from_cache) = if let Some(cached) = self.cache.get(model_id, input_hash).await
        {
            usage.record_cache_hit();
            (cached, true)
        } else {
            let (reply, tokens) = self.provider.chat(&messages, self.temperature).await?;
            usage.record_provider_call(&*self.provider, &tokens);
            (reply, false)
        };
        debug!(from_cache, reply = %reply, "Extraction reply");

        let record = self.interpret(&reply)?;
        if !from_cache {
            self.cache
                .put(model_id, &self.template_version, input_hash, &reply)
                .await;
        }

        Ok(Extraction {
            record,
            raw_response: reply,
            usage,
        })
    }

    fn interpret(&self, reply: &str) -> Result<ExtractedRecord, DocsiftError> {
        let provider = self.provider.display_name().to_string();
        if reply.trim().is_empty() {
            return Err(ExtractError::EmptyResponse { provider }.into());
        }
        recover_object(reply).map_err(|e| {
            match e {
                JsonRecovery::NoObject => ExtractError::NoJson { provider },
                JsonRecovery::Malformed(detail) => {
                    debug!(%detail, "Extraction reply did not parse");
                    ExtractError::MalformedJson { provider }
                }
            }
            .into()
        })
    }
}
