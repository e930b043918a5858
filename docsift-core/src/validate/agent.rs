// Validator agent: a short two-party conversation in which an assistant
// returns the record unchanged or corrected, as JSON only.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::ValidationSection;
use crate::error::ValidateError;
use crate::extract::json::{parse_object_lenient, recover_object, to_pretty_json};
use crate::llm::{ChatMessage, CostTracker, LlmProvider};
use crate::types::ExtractedRecord;

pub const VALIDATOR_SYSTEM_MESSAGE: &str = "You are a JSON validation assistant. \
Your ONLY task is to check the JSON and return a valid JSON object. \
You MUST respond ONLY with JSON and nothing else. \
DO NOT add explanations, instructions, or extra text. \
If the input JSON is correct, return it exactly as it is. \
If incorrect, return a corrected version.";

const NUDGE: &str = "Respond with the validated JSON object only.";

/// Outcome of a validator conversation.
#[derive(Debug, Clone)]
pub struct AgentVerdict {
    pub record: ExtractedRecord,
    pub raw_response: String,
    /// Assistant turns consumed.
    pub turns: u32,
    pub usage: CostTracker,
    /// True when the assistant changed the record.
    pub corrected: bool,
}

/// Failure plus the usage spent reaching it.
#[derive(Debug)]
pub struct AgentFailure {
    pub error: ValidateError,
    pub usage: CostTracker,
}

impl std::fmt::Display for AgentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct ValidatorAgent {
    provider: Arc<dyn LlmProvider>,
    max_turns: u32,
    termination_words: Vec<String>,
    temperature: f64,
}

impl ValidatorAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ValidationSection) -> Self {
        Self {
            provider,
            max_turns: config.max_turns.max(1),
            termination_words: config.termination_words.clone(),
            temperature: 0.0,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    fn is_termination(&self, reply: &str) -> bool {
        self.termination_words.iter().any(|w| w == reply)
    }

    /// Run the conversation over `record`.
    ///
    /// The first non-empty assistant reply is taken as the answer, a bare
    /// termination word included, so no further turns follow it. Empty
    /// replies are answered with a user nudge until the turn limit.
    #[instrument(skip_all, name = "validator_agent")]
    pub async fn validate(&self, record: &ExtractedRecord) -> Result<AgentVerdict, AgentFailure> {
        let mut usage = CostTracker::default();
        let mut messages = vec![
            ChatMessage::system(VALIDATOR_SYSTEM_MESSAGE),
            ChatMessage::user(to_pretty_json(record)),
        ];

        let mut answer = None;
        let mut turns = 0;
        while turns < self.max_turns {
            turns += 1;
            let (reply, tokens) = match self.provider.chat(&messages, self.temperature).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, turn = turns, "Validator call failed");
                    return Err(AgentFailure {
                        error: ValidateError::Failed(e.to_string()),
                        usage,
                    });
                }
            };
            usage.record_provider_call(&*self.provider, &tokens);

            let reply = reply.trim().to_string();
            debug!(turn = turns, reply = %reply, "Validator reply");

            if !reply.is_empty() {
                if self.is_termination(&reply) {
                    debug!(turn = turns, "Validator terminated the conversation");
                }
                answer = Some(reply);
                break;
            }
            messages.push(ChatMessage::user(NUDGE));
        }

        let Some(raw) = answer else {
            warn!(turns, "No valid content returned from assistant");
            return Err(AgentFailure {
                error: ValidateError::NoReply,
                usage,
            });
        };

        let validated = parse_object_lenient(&raw).or_else(|strict| {
            recover_object(&raw).map_err(|_| ValidateError::InvalidJson {
                message: strict,
                raw_response: raw.clone(),
            })
        });

        match validated {
            Ok(validated) => {
                let corrected = &validated != record;
                info!(turns, corrected, "Validation complete");
                Ok(AgentVerdict {
                    record: validated,
                    raw_response: raw,
                    turns,
                    usage,
                    corrected,
                })
            }
            Err(error) => Err(AgentFailure { error, usage }),
        }
    }
}
