//! Validation of extracted records.
//!
//! Two layers run after extraction: [`rules::FieldRules`] checks each field
//! deterministically (presence, pattern, date shape), then
//! [`agent::ValidatorAgent`] asks an LLM to confirm or correct the record.

pub mod agent;
pub mod rules;

pub use agent::{AgentFailure, AgentVerdict, ValidatorAgent};
pub use rules::FieldRules;
