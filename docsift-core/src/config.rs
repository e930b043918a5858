use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{FieldSpec, default_fields};

/// Default config file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "docsift.toml";

/// Top-level docsift configuration, matching `docsift.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocsiftConfig {
    #[serde(default)]
    pub ocr: OcrSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub extraction: ExtractionSection,
    #[serde(default)]
    pub validation: ValidationSection,
}

impl DocsiftConfig {
    /// Parse a config from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Load a config file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Load the explicit path if given, else `./docsift.toml` if it exists,
    /// else defaults.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let local = cwd.join(CONFIG_FILE_NAME);
        if local.exists() {
            Self::load(&local)
        } else {
            Ok(Self::default())
        }
    }

    /// Serialize to TOML (used by `docsift init`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Semantic checks that serde cannot express.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.extraction.fields.is_empty() {
            return Err(ConfigError::Invalid(
                "extraction.fields must list at least one field".into(),
            ));
        }
        for field in &self.extraction.fields {
            if field.key.trim().is_empty() {
                return Err(ConfigError::Invalid("field key must not be empty".into()));
            }
            if let Some(pattern) = &field.pattern {
                regex::Regex::new(pattern).map_err(|e| {
                    ConfigError::Invalid(format!("bad pattern for field {}: {e}", field.key))
                })?;
            }
        }
        if self.llm.max_concurrent == 0 {
            return Err(ConfigError::Invalid("llm.max_concurrent must be >= 1".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "llm.temperature out of range: {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSection {
    /// Tesseract language code(s), e.g. `eng` or `eng+hin`.
    pub language: String,
    /// Tesseract page segmentation mode.
    pub psm: u8,
    /// Rasterization resolution for PDF pages.
    pub dpi: u32,
    /// Convert images to grayscale before recognition.
    pub grayscale: bool,
    pub tesseract_bin: String,
    pub pdftoppm_bin: String,
}

impl Default for OcrSection {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            psm: 3,
            dpi: 200,
            grayscale: true,
            tesseract_bin: "tesseract".to_string(),
            pdftoppm_bin: "pdftoppm".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// `gemini`, `anthropic`, `openai`, or `custom`.
    pub provider: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    /// USD ceiling per document; 0 means unlimited.
    pub cost_budget: f64,
    /// Documents processed at once in batch mode.
    pub max_concurrent: u32,
    /// On-disk response cache; disabled when unset.
    pub cache_dir: Option<PathBuf>,
}

impl LlmSection {
    /// The explicit key if non-empty, else the variable named by `api_key_env`.
    pub fn resolve_api_key(&self, explicit: Option<&str>) -> Result<String, ConfigError> {
        if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(ConfigError::Invalid(format!(
                "API key not set: pass --api-key or set {}",
                self.api_key_env
            ))),
        }
    }
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: None,
            temperature: 0.0,
            max_tokens: 1024,
            cost_budget: 0.0,
            max_concurrent: 4,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSection {
    /// Bumped whenever the prompt wording changes; part of the cache key.
    pub template_version: String,
    pub fields: Vec<FieldSpec>,
}

impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            template_version: "extract-v1".to_string(),
            fields: default_fields(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    /// Run the validator agent after extraction.
    pub enabled: bool,
    /// Assistant turns before giving up on an empty conversation.
    pub max_turns: u32,
    /// Replies that end the conversation; they are still parsed as the answer.
    pub termination_words: Vec<String>,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_turns: 2,
            termination_words: vec!["TERMINATE".into(), "DONE".into()],
        }
    }
}
